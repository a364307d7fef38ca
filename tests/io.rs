use anyhow::Result;
use ironshuffle::{Datum, EngineConfig, RecordStream, read_csv, write_tsv, write_tsv_file};
use std::fs;

const ROWS: &str = "userId,movieId,rating,timestamp\n\
1,31,2.5,1260759144\n\
1,1029,3.0,1260759179\n\
7,31,4.0,1260759185\n";

#[test]
fn read_csv_keys_rows_and_splits_fields() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("ratings.csv");
    fs::write(&path, ROWS)?;

    let cfg = EngineConfig::default().with_split_size(2).with_spill_dir(tmp.path());
    let stream = read_csv(&path, true, &cfg)?;
    assert_eq!(stream.len(), 3);

    let pairs = stream.to_pairs()?;
    assert_eq!(pairs[0].0, Datum::Int(0));
    assert_eq!(pairs[2].1, Datum::tuple(["7", "31", "4.0", "1260759185"]));
    Ok(())
}

#[test]
fn read_csv_without_header_keeps_first_row() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("noheader.csv");
    fs::write(&path, "1,31,2.5,1260759144\n")?;
    let stream = read_csv(&path, false, &EngineConfig::default())?;
    assert_eq!(stream.len(), 1);
    Ok(())
}

#[test]
fn read_missing_file_fails_with_path() {
    let err = read_csv("/definitely/not/here.csv", false, &EngineConfig::default())
        .err()
        .expect("missing file");
    assert!(format!("{err:#}").contains("here.csv"));
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_input_is_detected_by_extension_and_magic() -> Result<()> {
    use flate2::Compression as Level;
    use flate2::write::GzEncoder;
    use ironshuffle::io::compression::Compression;
    use std::io::Write;

    let tmp = tempfile::tempdir()?;
    let mut gz = GzEncoder::new(Vec::new(), Level::default());
    gz.write_all(ROWS.as_bytes())?;
    let bytes = gz.finish()?;

    let named = tmp.path().join("ratings.csv.gz");
    let disguised = tmp.path().join("ratings.dat");
    fs::write(&named, &bytes)?;
    fs::write(&disguised, &bytes)?;
    assert_eq!(Compression::from_path(&named), Compression::Gzip);
    assert_eq!(Compression::from_path(&disguised), Compression::None);

    for path in [named, disguised] {
        let stream = read_csv(&path, true, &EngineConfig::default())?;
        assert_eq!(stream.len(), 3, "{}", path.display());
    }
    Ok(())
}

#[test]
fn write_tsv_renders_json_pairs() -> Result<()> {
    let stream = RecordStream::from_pairs(vec![
        (Datum::from("1023"), Datum::Int(2)),
        (Datum::from((5i64, "x")), Datum::Null),
    ]);
    let mut out = Vec::new();
    assert_eq!(write_tsv(&stream, &mut out)?, 2);
    assert_eq!(String::from_utf8(out)?, "\"1023\"\t2\n[5,\"x\"]\tnull\n");
    Ok(())
}

#[test]
fn write_tsv_file_creates_parents() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nested").join("out.tsv");
    let stream = RecordStream::from_pairs(vec![("a", 1i64)]);
    write_tsv_file(&stream, &path)?;
    assert_eq!(fs::read_to_string(&path)?, "\"a\"\t1\n");
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn write_tsv_file_compresses_gz_paths() -> Result<()> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("out.tsv.gz");
    let stream = RecordStream::from_pairs(vec![("a", 1i64), ("b", 2)]);
    assert_eq!(write_tsv_file(&stream, &path)?, 2);

    let mut text = String::new();
    GzDecoder::new(fs::File::open(&path)?).read_to_string(&mut text)?;
    assert_eq!(text, "\"a\"\t1\n\"b\"\t2\n");
    Ok(())
}
