//! MySQL/MariaDB drivers.
//!
//! - [`MysqlLegacyReader`]: reads the legacy schema through an SQLx pool
//! - [`MysqlTargetWriter`]: writes the target schema through one
//!   mysql_async session
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod reader;
mod writer;

pub use reader::MysqlLegacyReader;
pub use writer::MysqlTargetWriter;

/// Quote a MySQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
