// vzprune applies retention policies to vzdump backup archives
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use tempfile::tempdir;

use vzprune::{
    backend::{AbsentTransport, localfs::LocalFS},
    catalog::EntityFilter,
    config::RunConfig,
    disposal::RunMode,
    engine::{self, RunReport},
    error::RetentionError,
    retention::{FixedClock, RetentionPolicy},
    testing::{MockTransport, create_backup, list_names},
};

use super::{VM_PAYLOAD, create_vm_backups};
use crate::test_utils::{days_before, make_dir, test_now};

fn names_of(paths: &[std::path::PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_max_count_keeps_most_recent() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    let oldest = create_backup(&dumpdir, "qemu-101", &days_before(now, 30), VM_PAYLOAD)?;
    let middle = create_backup(&dumpdir, "qemu-101", &days_before(now, 10), VM_PAYLOAD)?;
    let newest = create_backup(&dumpdir, "qemu-101", &days_before(now, 1), VM_PAYLOAD)?;

    let config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxCount(1), RunMode::Live);
    let report = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    )?;

    assert_eq!(report.entities, 1);
    assert_eq!(report.kept, 1);
    assert_eq!(report.disposed, 2);
    assert_eq!(report.files, oldest.len() + middle.len());

    assert!(oldest.iter().chain(middle.iter()).all(|p| !p.exists()));
    assert_eq!(list_names(&dumpdir)?, names_of(&newest));

    Ok(())
}

#[test]
fn test_max_age_disposes_older_than_cutoff() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    let oldest = create_backup(&dumpdir, "qemu-101", &days_before(now, 30), VM_PAYLOAD)?;
    let mut kept = create_backup(&dumpdir, "qemu-101", &days_before(now, 10), VM_PAYLOAD)?;
    kept.extend(create_backup(
        &dumpdir,
        "qemu-101",
        &days_before(now, 1),
        VM_PAYLOAD,
    )?);

    let config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxAge(15), RunMode::Live);
    let report = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    )?;

    assert_eq!(report.kept, 2);
    assert_eq!(report.disposed, 1);
    assert!(oldest.iter().all(|p| !p.exists()));
    assert_eq!(list_names(&dumpdir)?, names_of(&kept));

    Ok(())
}

#[test]
fn test_entity_filter_leaves_other_entities_alone() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    let timestamps = [days_before(now, 30), days_before(now, 20)];
    create_vm_backups(&dumpdir, "qemu-101", &timestamps)?;
    create_vm_backups(&dumpdir, "qemu-202", &timestamps)?;
    create_backup(&dumpdir, "lxc-202", &days_before(now, 40), &["tar.zst"])?;

    let mut config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxCount(0), RunMode::Live);
    config.entity_filter = EntityFilter::from_values(["101"]);

    let report = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    )?;

    assert_eq!(report.entities, 1);
    assert_eq!(report.disposed, 2);

    let names = list_names(&dumpdir)?;
    assert!(names.iter().all(|n| !n.contains("-101-")));
    assert_eq!(names.iter().filter(|n| n.contains("qemu-202")).count(), 6);
    assert_eq!(names.iter().filter(|n| n.contains("lxc-202")).count(), 2);

    Ok(())
}

#[test]
fn test_malformed_manifest_halts_before_disposal() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    create_vm_backups(
        &dumpdir,
        "qemu-101",
        &[days_before(now, 30), days_before(now, 20)],
    )?;
    std::fs::write(dumpdir.join("vzdump-qemu-101-2025_13_01-00_00_00.log"), "")?;
    let before = list_names(&dumpdir)?;

    let config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxCount(0), RunMode::Live);
    let result = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    );

    assert!(matches!(
        result,
        Err(RetentionError::MalformedFilename { .. })
    ));
    assert_eq!(list_names(&dumpdir)?, before);

    Ok(())
}

#[test]
fn test_unreadable_backup_dir() -> Result<()> {
    let tmp = tempdir()?;
    let config = RunConfig::new(
        tmp.path().join("missing"),
        RetentionPolicy::MaxAge(7),
        RunMode::Live,
    );

    let result = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(test_now()),
    );
    assert!(matches!(
        result,
        Err(RetentionError::DirectoryUnreadable { .. })
    ));

    Ok(())
}

#[test]
fn test_invalid_policy_is_reported_before_scan() -> Result<()> {
    let tmp = tempdir()?;
    let config = RunConfig::new(
        tmp.path().join("missing"),
        RetentionPolicy::MaxCount(-1),
        RunMode::Live,
    );

    let result = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(test_now()),
    );
    assert!(matches!(result, Err(RetentionError::InvalidPolicyValue(_))));

    Ok(())
}

#[test]
fn test_dry_run_touches_nothing() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let archive = make_dir(tmp.path(), "archive")?;
    let now = test_now();

    create_vm_backups(
        &dumpdir,
        "qemu-101",
        &[days_before(now, 30), days_before(now, 10), days_before(now, 1)],
    )?;
    let before = list_names(&dumpdir)?;

    let policy = RetentionPolicy::MaxCount(1);
    let delete = RunConfig::new(dumpdir.clone(), policy, RunMode::DryRun);
    let mut move_local = RunConfig::new(dumpdir.clone(), policy, RunMode::DryRun);
    move_local.archive_dir = Some(archive.clone());
    let mut upload = upload_config(&dumpdir, RetentionPolicy::MaxCount(1));
    upload.mode = RunMode::DryRun;

    for config in [delete, move_local, upload] {
        let mut transport = MockTransport::connected();
        let report = engine::execute(&config, &LocalFS::new(), &mut transport, &FixedClock(now))?;

        assert_eq!(report.disposed, 2);
        assert_eq!(report.files, 6);
        assert_eq!(transport.put_calls, 0);
        assert_eq!(list_names(&dumpdir)?, before);
        assert!(list_names(&archive)?.is_empty());
    }

    Ok(())
}

#[test]
fn test_dry_run_is_repeatable() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    create_vm_backups(
        &dumpdir,
        "lxc-300",
        &[days_before(now, 3), days_before(now, 9), days_before(now, 27)],
    )?;

    let config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxAge(5), RunMode::DryRun);
    let run = || -> Result<RunReport> {
        Ok(engine::execute(
            &config,
            &LocalFS::new(),
            &mut AbsentTransport,
            &FixedClock(now),
        )?)
    };

    let first = run()?;
    let second = run()?;
    assert_eq!(first, second);
    assert_eq!(first.disposed, 2);

    Ok(())
}

#[test]
fn test_move_to_archive_dir() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let archive = make_dir(tmp.path(), "archive")?;
    let now = test_now();

    let moved = create_backup(&dumpdir, "qemu-101", &days_before(now, 30), VM_PAYLOAD)?;
    let kept = create_backup(&dumpdir, "qemu-101", &days_before(now, 1), VM_PAYLOAD)?;

    let mut config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxCount(1), RunMode::Live);
    config.archive_dir = Some(archive.clone());

    engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    )?;

    assert_eq!(list_names(&dumpdir)?, names_of(&kept));
    assert_eq!(list_names(&archive)?, names_of(&moved));

    // The contents travel with the files.
    for source in &moved {
        let target = archive.join(source.file_name().unwrap());
        assert_eq!(
            std::fs::read_to_string(&target)?,
            source.to_string_lossy()
        );
    }

    Ok(())
}

#[test]
fn test_missing_archive_dir_fails_before_disposal() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    create_vm_backups(
        &dumpdir,
        "qemu-101",
        &[days_before(now, 30), days_before(now, 1)],
    )?;
    let before = list_names(&dumpdir)?;

    let mut config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxCount(1), RunMode::Live);
    config.archive_dir = Some(tmp.path().join("no-such-archive"));

    let result = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    );

    assert!(matches!(
        result,
        Err(RetentionError::ArchiveTargetUnwritable { .. })
    ));
    assert_eq!(list_names(&dumpdir)?, before);

    Ok(())
}

#[test]
fn test_upload_then_delete() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    let uploaded = create_backup(&dumpdir, "qemu-101", &days_before(now, 30), VM_PAYLOAD)?;
    let kept = create_backup(&dumpdir, "qemu-101", &days_before(now, 1), VM_PAYLOAD)?;

    let mut transport = MockTransport::connected();
    let config = upload_config(&dumpdir, RetentionPolicy::MaxCount(1));

    let report = engine::execute(&config, &LocalFS::new(), &mut transport, &FixedClock(now))?;

    assert_eq!(report.disposed, 1);
    assert_eq!(transport.put_calls, uploaded.len());
    assert_eq!(list_names(&dumpdir)?, names_of(&kept));

    let mut remote_names: Vec<String> = transport
        .uploads
        .iter()
        .map(|(path, _)| {
            assert!(path.starts_with("/srv/backups/old"));
            path.file_name().unwrap().to_string_lossy().to_string()
        })
        .collect();
    remote_names.sort();
    assert_eq!(remote_names, names_of(&uploaded));

    // The session belongs to the caller.
    assert_eq!(transport.close_calls, 0);

    Ok(())
}

#[test]
fn test_failed_upload_keeps_local_files() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    create_vm_backups(
        &dumpdir,
        "qemu-101",
        &[days_before(now, 30), days_before(now, 20), days_before(now, 1)],
    )?;
    let before = list_names(&dumpdir)?;

    let mut transport = MockTransport::failing();
    let config = upload_config(&dumpdir, RetentionPolicy::MaxCount(1));

    let result = engine::execute(&config, &LocalFS::new(), &mut transport, &FixedClock(now));

    assert!(matches!(
        result,
        Err(RetentionError::RemoteTransferFailed { .. })
    ));
    // The first failure aborts the run.
    assert_eq!(transport.put_calls, 1);
    assert_eq!(list_names(&dumpdir)?, before);

    Ok(())
}

#[test]
fn test_nothing_to_dispose() -> Result<()> {
    let tmp = tempdir()?;
    let dumpdir = make_dir(tmp.path(), "dump")?;
    let now = test_now();

    create_vm_backups(
        &dumpdir,
        "qemu-101",
        &[days_before(now, 2), days_before(now, 1)],
    )?;

    // The archive check only runs when something is disposed of.
    let mut config = RunConfig::new(dumpdir.clone(), RetentionPolicy::MaxCount(5), RunMode::Live);
    config.archive_dir = Some(tmp.path().join("no-such-archive"));

    let report = engine::execute(
        &config,
        &LocalFS::new(),
        &mut AbsentTransport,
        &FixedClock(now),
    )?;
    assert_eq!(
        report,
        RunReport {
            entities: 1,
            kept: 2,
            ..Default::default()
        }
    );

    Ok(())
}

fn upload_config(dumpdir: &std::path::Path, policy: RetentionPolicy) -> RunConfig {
    use secrecy::SecretString;
    use vzprune::config::{RemoteAuth, RemoteConfig};

    let mut config = RunConfig::new(dumpdir.to_path_buf(), policy, RunMode::Live);
    config.archive_dir = Some("/srv/backups/old".into());
    config.remote = Some(RemoteConfig {
        host: "backup.example.org".to_string(),
        port: 22,
        user: "root".to_string(),
        auth: RemoteAuth::Password(SecretString::from("secret".to_string())),
        expected_host_key: None,
    });
    config
}
