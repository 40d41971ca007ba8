use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn sample_tree(dir: &std::path::Path) {
    fs::create_dir_all(dir.join("sub")).unwrap();
    let mut f = fs::File::create(dir.join("a.txt")).unwrap();
    writeln!(f, "Hello from the first file.").unwrap();
    let mut g = fs::File::create(dir.join("sub/b.log")).unwrap();
    writeln!(g, "Some log data here.").unwrap();
}

#[test]
fn requires_a_mode() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("partar")?;
    cmd.arg("-f").arg("out.tar").arg("something");
    cmd.assert().failure().stderr(predicate::str::contains("required"));
    Ok(())
}

#[test]
fn rejects_conflicting_modes() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("partar")?;
    cmd.arg("-c").arg("-x").arg("-f").arg("out.tar").arg("something");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
    Ok(())
}

#[test]
fn extract_mode_is_reported_unimplemented() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("partar")?;
    cmd.arg("-x").arg("-f").arg("out.tar");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not implemented"));
    Ok(())
}

#[test]
fn create_requires_sources() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("partar")?;
    cmd.arg("-c").arg("-f").arg("out.tar");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("source"));
    Ok(())
}

#[test]
fn create_rejects_zero_chunk_size() -> Result<(), Box<dyn std::error::Error>> {
    let source = tempdir()?;
    let mut cmd = Command::cargo_bin("partar")?;
    cmd.arg("-c")
        .arg("-s")
        .arg("0")
        .arg("-f")
        .arg("out.tar")
        .arg(source.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("chunk size"));
    Ok(())
}

#[test]
fn create_produces_an_archive() -> Result<(), Box<dyn std::error::Error>> {
    let source = tempdir()?;
    sample_tree(source.path());
    let out = tempdir()?;
    let archive = out.path().join("test.tar");

    let mut cmd = Command::cargo_bin("partar")?;
    cmd.arg("--create")
        .arg("-f")
        .arg(&archive)
        .arg("-j")
        .arg("2")
        .arg(source.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[partar] Archive complete"));

    let len = fs::metadata(&archive)?.len();
    assert!(len > 0);
    assert_eq!(len % 512, 0);
    Ok(())
}
