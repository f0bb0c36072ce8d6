//! Theme editing and persistence for map posters: color conversion, palette
//! parsing, a local theme store with permanent hiding, and a remote copy kept
//! in step through optimistic concurrency.

mod color;
mod palette;
mod remote;
mod session;
mod store;
mod theme;

pub use color::{hex_to_rgb, oklch_to_hex, ColorError, HexColor};
pub use palette::{
    normalize_label, palette_placeholder, palette_prompt_template, parse_palette_block,
    parse_single_color, role_for_label, Oklch, PaletteError, MAX_CHROMA,
};
pub use remote::{
    ContentApi, GitHubContentApi, PushReceipt, PutRequest, RemoteCredentials,
    RemoteDeleteOutcome, RemoteError, RemoteThemeSync, VersionToken, WriteKind,
    DEFAULT_REMOTE_API_BASE, DEFAULT_REMOTE_PATH_PREFIX, DEFAULT_REMOTE_REPO,
};
pub use session::{DeleteReport, EditingSession, SaveOutcome, ThemePersistence, ThemeSource};
pub use store::{ThemeStore, ThemeStoreError, HIDDEN_THEMES_FILE_NAME};
pub use theme::{
    display_name, theme_id_from_input, validate_theme_id, RoleKey, Theme,
    DEFAULT_THEME_DESCRIPTION, DEFAULT_THEME_NAME, FALLBACK_THEME_ID, RESERVED_THEME_ID,
};
