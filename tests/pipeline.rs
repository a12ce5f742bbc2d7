use std::fs;

use tempfile::TempDir;

use zenkoku::config::ReadOptions;
use zenkoku::model::{make_key, KeySpec};
use zenkoku::partition::{InputName, Partitioner};
use zenkoku::{CsvSource, Differ, RowSource};

fn source(dir: &TempDir, name: &str, contents: &str) -> CsvSource {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    CsvSource::open(&path, &ReadOptions::default()).unwrap()
}

#[test]
fn test_diff_is_symmetric() {
    let dir = TempDir::new().unwrap();
    let a = source(&dir, "a.csv", "id,name\n1,A\n2,B\n5,E\n");
    let b = source(&dir, "b.csv", "id,name\n1,A\n3,C\n4,D\n");
    let differ = Differ::new(KeySpec::parse("id"));

    let forward = differ.diff_tables(&a, &b).unwrap();
    let backward = differ.diff_tables(&b, &a).unwrap();

    assert_eq!(forward.added.rows, backward.removed.rows);
    assert_eq!(forward.removed.rows, backward.added.rows);
    assert_eq!(forward.added_count, 2);
    assert_eq!(forward.removed_count, 2);

    let self_diff = differ.diff_tables(&a, &a).unwrap();
    assert!(self_diff.added.is_empty());
    assert!(self_diff.removed.is_empty());
}

#[test]
fn test_added_keys_are_new_only() {
    let dir = TempDir::new().unwrap();
    let old = source(&dir, "old.csv", "id,code,name\n1, x ,A\n2,y,B\n");
    let new = source(&dir, "new.csv", "id,code,name\n1,x,A2\n2,z,B\n");
    let key = KeySpec::parse("id,code");

    let result = Differ::new(key.clone()).diff_tables(&old, &new).unwrap();
    let old_keys: Vec<_> = old
        .rows()
        .unwrap()
        .map(|row| make_key(&row.unwrap(), key.columns()))
        .collect();

    assert_eq!(result.added.row_count(), 1);
    for row in result.added.iter() {
        assert!(!old_keys.contains(&key.key(row)));
    }
    assert_eq!(result.added.rows[0].get("code"), Some("z"));
}

#[test]
fn test_partition_accounts_for_every_row() {
    let dir = TempDir::new().unwrap();
    let input = source(
        &dir,
        "input.csv",
        "pref,x\nTokyo,1\nOsaka,2\n,3\nKyoto,4\nTokyo,5\n  ,6\n",
    );
    let out_dir = dir.path().join("out");

    let summary = Partitioner::new("pref", &out_dir)
        .with_include(["Tokyo", "Osaka"])
        .partition(&input, &InputName::from_path(input.path()))
        .unwrap();

    assert_eq!(summary.rows_read, 6);
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.skipped_empty, 2);
    assert_eq!(summary.skipped_excluded, 1);
    assert_eq!(
        summary.total() + summary.skipped_empty + summary.skipped_excluded,
        summary.rows_read
    );

    for (value, path) in &summary.files {
        let written = CsvSource::open(path, &ReadOptions::default())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(written.row_count(), summary.counts[value]);
        assert!(written.iter().all(|row| row.get("pref") == Some(value.as_str())));
    }
}
