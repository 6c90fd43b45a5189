// Copyright © 2024 Pathway

use super::error::{DynError, DynResult};
use super::record::Record;

/// Returned by a transform to send the output records to every output port.
pub const ALL: i32 = i32::MAX;

/// Turns one joined tuple into output records.
///
/// `inputs` has one slot per joined stream, `None` where the stream has no
/// record with the current key. `outputs` has one record per output port,
/// reset before every call. A non-negative result selects the port to write
/// (or [`ALL`]); a negative result reports a failed tuple, handled according
/// to the configured error actions.
pub trait RecordTransform {
    fn transform(&mut self, inputs: &[Option<&Record>], outputs: &mut [Record]) -> DynResult<i32>;

    /// Called when [`RecordTransform::transform`] returned an error.
    fn transform_on_error(
        &mut self,
        error: DynError,
        _inputs: &[Option<&Record>],
        _outputs: &mut [Record],
    ) -> DynResult<i32> {
        Err(error)
    }

    /// Details of the last negative result.
    fn message(&self) -> Option<String> {
        None
    }

    fn finished(&mut self) {}
}

/// Pins the signature of a closure so it can be passed as a transform.
pub fn from_fn<F>(function: F) -> F
where
    F: FnMut(&[Option<&Record>], &mut [Record]) -> DynResult<i32>,
{
    function
}

impl<F> RecordTransform for F
where
    F: FnMut(&[Option<&Record>], &mut [Record]) -> DynResult<i32>,
{
    fn transform(&mut self, inputs: &[Option<&Record>], outputs: &mut [Record]) -> DynResult<i32> {
        self(inputs, outputs)
    }
}
