// Copyright © 2024 Pathway

pub mod buffer;
pub mod carousel;
pub mod external;
pub mod tape;

pub use buffer::SortBuffer;
pub use carousel::TapeCarousel;
pub use external::{ExternalSorter, SortStats};
pub use tape::Tape;
