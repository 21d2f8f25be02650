//! Read-side queries: listing filters and application search.

mod apps;
mod filter;

pub use apps::{default_application_dirs, strip_field_codes, AppCatalog, Application};
pub use filter::{is_media_type, ListingFilter, MEDIA_TYPES};
