//! Human-readable results on stdout. Diagnostics go to the log on stderr.

use std::io::{self, Write};

use api_client::Secret;
use azure_identity::AccessToken;
use graph::{GroupQuery, GroupRecord};

const TOKEN_PREVIEW: usize = 10;

pub(crate) fn token_acquired<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Microsoft Graph access token acquired successfully.")
}

/// Only the first few characters, enough to tell tokens apart.
pub(crate) fn token_preview<W: Write>(out: &mut W, token: &AccessToken) -> io::Result<()> {
    writeln!(out, "Token = {}", token.token.preview(TOKEN_PREVIEW))?;
    writeln!(out, "Expires = {}", token.expires_on.to_rfc3339())
}

pub(crate) fn secret_value<W: Write>(out: &mut W, secret: &Secret) -> io::Result<()> {
    writeln!(out, "Value:{}", secret.revealed())
}

pub(crate) fn secret_retrieved<W: Write>(out: &mut W, name: &str) -> io::Result<()> {
    writeln!(out, "Secret '{name}' retrieved successfully.")
}

pub(crate) fn group_found<W: Write>(out: &mut W, group: &GroupRecord) -> io::Result<()> {
    writeln!(out, "Group '{}' exists.", group.display_name)?;
    writeln!(out, "Group name: {}", group.display_name)?;
    writeln!(out, "Group id: {}", group.id)
}

pub(crate) fn group_missing<W: Write>(out: &mut W, query: &GroupQuery) -> io::Result<()> {
    writeln!(
        out,
        "ERROR: Group '{}' does not exist in Entra ID.",
        query.supplied()
    )
}
