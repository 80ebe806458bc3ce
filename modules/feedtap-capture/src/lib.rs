pub mod aggregate;
pub mod driver;
pub mod envelope;
pub mod extract;
pub mod profile;
pub mod progress;
pub mod projection;
pub mod replay;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
mod walk;

pub use aggregate::PostAggregator;
pub use driver::{CaptureSession, TargetCapture};
pub use envelope::{Envelope, EnvelopeExtractor};
pub use extract::{ExtractionReport, SkipReason};
pub use profile::HtmlProfileScraper;
pub use progress::{ProgressMonitor, ProgressState};
pub use projection::{project, PostRow};
pub use replay::ReplayBrowser;
pub use traits::{BrowserSession, ProfileScraper};
