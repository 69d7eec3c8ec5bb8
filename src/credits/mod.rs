pub mod transaction;

pub use transaction::{
    attempt_generation, GenerationReply, GenerationService, GenerationSuccess, InlineImage,
};
