// Copyright © 2024 Pathway

pub mod merge_join;
pub mod reader;
pub mod run_buffer;

pub use merge_join::{JoinStats, MergeJoin};
pub use reader::InputReader;
pub use run_buffer::RunBuffer;
