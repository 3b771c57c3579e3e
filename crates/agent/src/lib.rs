//! The reply-side of Eidolon: trigger routing, context collection,
//! budgeted prompt assembly, and the orchestrating pipeline.

pub mod collector;
pub mod formatter;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod router;
pub mod skills;

pub use collector::RecentMessageCollector;
pub use formatter::ReplyFormatter;
pub use pipeline::{ExtractionScheduler, PipelineOutcome, ResponsePipeline};
pub use prompt::{estimate_tokens, PromptBuildResult, PromptBuilder};
pub use query::build_scene_query;
pub use router::TriggerRouter;
pub use skills::{load_skill_excerpt, SkillExcerptError, DEFAULT_MAX_CHARS, SUPPORTED_RULESETS};
