pub mod collaborators;
pub mod compose;
pub mod dashscope;
pub mod fallback;
pub mod filters;
pub mod imaging;
pub mod pipeline;
pub mod prompt;
pub mod storage;
pub mod transport;
pub mod typeface;
