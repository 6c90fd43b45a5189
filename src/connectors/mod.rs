pub mod channel;
pub mod data_storage;
pub mod memory;

pub use channel::{channel, ChannelReader, ChannelWriter};
pub use data_storage::{BroadcastWriter, ReadError, RecordReader, RecordWriter, WriteError};
pub use memory::{VecReader, VecWriter};
