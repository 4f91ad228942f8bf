//! Retrieval engines
//!
//! The orchestrator treats retrieval as a black box behind the
//! [`RetrievalEngine`] trait: given a URL and options it produces a local file
//! or fails with a reason. [`YtDlpEngine`] is the production implementation,
//! driving the external `yt-dlp` binary.

mod parser;
mod traits;
mod ytdlp;

pub use parser::{FormatSelection, quality_options, select_format};
pub use traits::{RetrievalEngine, RetrievalError, RetrievalRequest, Retrieved};
pub use ytdlp::YtDlpEngine;
