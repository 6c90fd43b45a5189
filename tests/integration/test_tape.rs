// Copyright © 2024 Pathway

use assert_matches::assert_matches;
use tempfile::tempdir;

use tapejoin_engine::engine::sort::{Tape, TapeCarousel};
use tapejoin_engine::engine::{Error, Record, Value};

use super::helpers::keyed_schema;

fn drain_chunk(tape: &mut Tape) -> eyre::Result<Vec<Vec<u8>>> {
    let mut result = Vec::new();
    let mut buffer = Vec::new();
    while tape.get_raw(&mut buffer)? {
        result.push(buffer.clone());
    }
    Ok(result)
}

#[test]
fn test_chunks_and_rewind() -> eyre::Result<()> {
    let directory = tempdir()?;
    let mut tape = Tape::new(0, directory.path(), false)?;

    tape.add_data_chunk();
    for data in [b"one".as_slice(), b"two".as_slice(), b"".as_slice()] {
        tape.put(data)?;
    }
    tape.flush()?;
    tape.add_data_chunk();
    tape.put(b"three")?;
    tape.put(b"four")?;
    assert_eq!(tape.num_chunks(), 2);

    tape.rewind()?;
    assert_eq!(drain_chunk(&mut tape)?, vec![b"one".to_vec(), b"two".to_vec(), Vec::new()]);
    assert!(tape.next_data_chunk()?);
    assert_eq!(drain_chunk(&mut tape)?, vec![b"three".to_vec(), b"four".to_vec()]);
    assert!(!tape.next_data_chunk()?);
    assert_eq!(drain_chunk(&mut tape)?, Vec::<Vec<u8>>::new());

    // a second read after rewind sees the same data
    tape.rewind()?;
    assert_eq!(drain_chunk(&mut tape)?.len(), 3);
    Ok(())
}

#[test]
fn test_records_on_tape() -> eyre::Result<()> {
    let directory = tempdir()?;
    let metadata = keyed_schema("tape");
    let mut tape = Tape::new(3, directory.path(), true)?;
    tape.add_data_chunk();
    let mut buffer = Vec::new();
    for id in 0..10 {
        let record = Record::from_values(metadata.clone(), [Value::Int(id), Value::None])?;
        buffer.clear();
        record.serialize(&mut buffer)?;
        tape.put(&buffer)?;
    }
    tape.rewind()?;

    let mut record = Record::new(metadata);
    let mut ids = Vec::new();
    while tape.get(&mut record)? {
        ids.push(record.field_by_name("id")?.as_int()?);
        assert_eq!(record.field_by_name("name")?, &Value::None);
    }
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_put_without_chunk_is_fatal() -> eyre::Result<()> {
    let directory = tempdir()?;
    let mut tape = Tape::new(7, directory.path(), false)?;
    let error = tape.put(b"orphan").unwrap_err();
    assert!(error.is_fatal());
    assert_matches!(error, Error::NoOpenChunk(7));
    Ok(())
}

#[test]
fn test_clear_keeps_file() -> eyre::Result<()> {
    let directory = tempdir()?;
    let mut tape = Tape::new(0, directory.path(), false)?;
    tape.add_data_chunk();
    tape.put(b"gone")?;
    tape.clear()?;
    assert_eq!(tape.num_chunks(), 0);
    assert!(tape.path().exists());

    tape.rewind()?;
    assert_eq!(drain_chunk(&mut tape)?, Vec::<Vec<u8>>::new());

    tape.add_data_chunk();
    tape.put(b"fresh")?;
    tape.rewind()?;
    assert_eq!(drain_chunk(&mut tape)?, vec![b"fresh".to_vec()]);
    Ok(())
}

#[test]
fn test_tape_file_removed_on_drop() -> eyre::Result<()> {
    let directory = tempdir()?;
    let tape = Tape::new(0, directory.path(), false)?;
    let path = tape.path().to_path_buf();
    assert!(path.exists());
    drop(tape);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_carousel_cursor() -> eyre::Result<()> {
    let first = tempdir()?;
    let second = tempdir()?;
    let directories = vec![first.path().join("a"), second.path().to_path_buf()];
    let mut carousel = TapeCarousel::new(4, directories.clone(), false);
    assert!(!carousel.is_open());
    assert!(carousel.rotate().is_none());
    assert!(carousel.current_tape().is_none());
    assert!(carousel.first_tape().is_none());
    carousel.open()?;
    assert!(carousel.is_open());
    assert_eq!(carousel.num_tapes(), 4);

    for index in 0..4 {
        let tape = carousel.tape(index).expect("tape exists");
        assert_eq!(tape.index(), index);
        assert_eq!(tape.path().parent(), Some(directories[index % 2].as_path()));
    }

    assert_eq!(carousel.first_tape().map(|tape| tape.index()), Some(0));
    assert_eq!(carousel.next_tape().map(|tape| tape.index()), Some(1));
    assert_eq!(carousel.next_tape().map(|tape| tape.index()), Some(2));
    assert_eq!(carousel.next_tape().map(|tape| tape.index()), Some(3));
    assert!(carousel.next_tape().is_none());
    assert_eq!(carousel.rotate().map(|tape| tape.index()), Some(0));
    assert_eq!(carousel.rotate().map(|tape| tape.index()), Some(1));

    let tape = carousel.current_tape().expect("carousel is open");
    tape.add_data_chunk();
    tape.put(b"x")?;
    carousel.rewind()?;
    assert_eq!(carousel.tape(1).map(Tape::num_chunks), Some(1));
    assert!(!carousel.next_data_chunks()?);

    carousel.clear()?;
    assert_eq!(carousel.tape(1).map(Tape::num_chunks), Some(0));
    carousel.free();
    assert!(!carousel.is_open());
    assert_eq!(std::fs::read_dir(second.path())?.count(), 0);
    Ok(())
}
