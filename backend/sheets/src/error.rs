use thiserror::Error;

use ocrbench_infra::AuthError;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Invalid spreadsheet URL format")]
    InvalidUrl,

    #[error(
        "Spreadsheet '{name}' was not found and could not be created ({reason}). \
         Create it at https://sheets.google.com, share it with {account} as an editor, \
         then set SPREADSHEET_URL"
    )]
    NotFound {
        name: String,
        account: String,
        reason: String,
    },

    #[error("Spreadsheet '{0}' does not exist or is not shared with this account")]
    UnknownSpreadsheet(String),

    #[error("Sheets API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Sheets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected Sheets response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
