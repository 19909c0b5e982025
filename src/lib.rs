//! Driver for the OpenJML toolchain.
//!
//! OpenJML is launched as an external process; its javac-style report is parsed
//! into [`JmlDiagnostic`]s.
//!
//! # Example
//! ```ignore
//! use openjml::{OpenJml, OpenJmlConfig};
//!
//! let openjml = OpenJml::new(OpenJmlConfig::default());
//! println!("{}", openjml.version().await?);
//!
//! let outcome = openjml.check_workspace(&[workspace_root]).await?;
//! for finding in outcome.diagnostics {
//!     println!("{}:{}: {}", finding.path.display(), finding.line, finding.message);
//! }
//! ```

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod fingerprint;
pub mod report;
pub mod runner;
pub mod sources;

pub use config::{CheckMode, OpenJmlConfig};
pub use diagnostic::{DiagnosticKind, JmlDiagnostic};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use runner::{CheckOutcome, OpenJml};
