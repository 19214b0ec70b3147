pub mod analysis;
pub mod classifier;
pub mod extractors;
pub mod normalizer;
pub mod sessions;
pub mod upload_slot;

pub use analysis::{AnalysisError, AnalysisService, GeminiAnalysisService, GeminiConfig};
pub use classifier::{classify, is_multimodal};
pub use extractors::{
    DocxTextExtractor, ExtractError, LopdfPageExtractor, PageTextExtractor, PlainTextExtractor,
    RawTextExtractor,
};
pub use normalizer::{require_usable, DocumentNormalizer, NormalizeError};
pub use sessions::{SessionError, SessionStore};
pub use upload_slot::{SelectionTicket, SlotOutcome, SlotPhase, UploadSlot};
