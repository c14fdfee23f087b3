//! Integration tests for statecache

mod repository_tests {
    use serial_test::serial;
    use statecache::cache::{FileAccessTimeJournal, ModificationTimeJournal, CLEANUP_MARKER_FILENAME};
    use statecache::config::CacheConfig;
    use statecache::state::{
        AnyStateFile, CheckedFingerprint, StateFile, StateLayout, StateType, WriteLayout,
        WriteableStateFile,
    };
    use statecache::{CacheRepository, StateCacheError, StateCacheResult};
    use std::fs;
    use std::io::{Read, Write};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn open(temp: &TempDir) -> CacheRepository {
        CacheRepository::open(temp.path().join("cache"), &CacheConfig::default()).unwrap()
    }

    fn write_primary(repo: &CacheRepository, key: &str, state: StateType, bytes: &[u8]) {
        repo.store_state(key, state, |layout| -> StateCacheResult<()> {
            layout
                .primary()
                .open_for_write()?
                .write_all(bytes)
                .map_err(|e| StateCacheError::io("writing", e))
        })
        .unwrap();
    }

    fn read_primary(repo: &CacheRepository, key: &str, state: StateType) -> Vec<u8> {
        repo.load_state(key, state, |layout| -> StateCacheResult<Vec<u8>> {
            let mut bytes = Vec::new();
            layout
                .primary()
                .open_for_read()?
                .read_to_end(&mut bytes)
                .map_err(|e| StateCacheError::io("reading", e))?;
            Ok(bytes)
        })
        .unwrap()
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn unknown_key_is_unreadable_for_every_state_type() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        for state in StateType::all() {
            let readable = repo
                .load_state("never-stored", *state, |layout| {
                    Ok::<_, StateCacheError>(layout.primary().can_read())
                })
                .unwrap();
            assert!(!readable, "{state} should not be readable");
        }
    }

    #[test]
    fn store_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        write_primary(&repo, "abc", StateType::Entry, &payload);
        write_primary(&repo, "abc", StateType::Model, b"");

        assert_eq!(read_primary(&repo, "abc", StateType::Entry), payload);
        assert!(read_primary(&repo, "abc", StateType::Model).is_empty());
        assert!(repo.base_dir().join("abc").join("entry.bin").is_file());
    }

    #[test]
    fn fingerprint_lifecycle_across_checks() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        write_primary(&repo, "abc", StateType::Fingerprint, b"v1");
        assert_eq!(read_primary(&repo, "abc", StateType::Fingerprint), b"v1");

        let valid = repo
            .check_fingerprint("abc", |_| Ok::<_, StateCacheError>(None))
            .unwrap();
        assert_eq!(valid, CheckedFingerprint::Valid);

        let invalid = repo
            .check_fingerprint("abc", |_| {
                Ok::<_, StateCacheError>(Some("file system input changed".to_string()))
            })
            .unwrap();
        assert_eq!(
            invalid,
            CheckedFingerprint::Invalid("file system input changed".to_string())
        );

        let missing = repo
            .check_fingerprint("missing", |_| Ok::<_, StateCacheError>(None))
            .unwrap();
        assert_eq!(missing, CheckedFingerprint::NotFound);

        repo.shutdown().unwrap();
    }

    #[test]
    fn check_errors_propagate() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        write_primary(&repo, "abc", StateType::Fingerprint, b"v1");

        let err = repo
            .check_fingerprint("abc", |file| {
                Err::<Option<String>, _>(StateCacheError::NotFound(file.path().to_path_buf()))
            })
            .unwrap_err();
        assert!(matches!(err, StateCacheError::NotFound(_)));
    }

    #[test]
    #[cfg(unix)]
    fn permissions_hardened_after_successful_store() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        repo.store_state("abc", StateType::Entry, |layout| -> StateCacheResult<()> {
            layout.primary().open_for_write()?;
            layout.file_for(StateType::Work).open_for_write()?;
            layout.primary().for_included_build("B").open_for_write()?;
            Ok(())
        })
        .unwrap();

        let entry = repo.base_dir().join("abc");
        assert_eq!(mode(&entry), 0o700);
        for name in ["entry.bin", "work.bin", "entry.bin.B"] {
            assert_eq!(mode(&entry.join(name)), 0o600, "{name}");
        }
    }

    #[test]
    #[cfg(unix)]
    fn permissions_hardened_when_store_fails() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        let result = repo.store_state("abc", StateType::Entry, |layout| -> StateCacheResult<()> {
            layout
                .primary()
                .open_for_write()?
                .write_all(b"partial")
                .map_err(|e| StateCacheError::io("writing", e))?;
            Err(StateCacheError::io(
                "serializing",
                std::io::Error::other("serializer blew up"),
            ))
        });

        assert!(matches!(result, Err(StateCacheError::Io { context, .. }) if context == "serializing"));
        assert_eq!(mode(&repo.base_dir().join("abc").join("entry.bin")), 0o600);
    }

    #[test]
    #[cfg(unix)]
    fn permissions_hardened_when_store_panics() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: StateCacheResult<()> = repo.store_state("abc", StateType::Work, |layout| {
                layout.primary().open_for_write()?;
                panic!("action failed mid-write");
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(mode(&repo.base_dir().join("abc").join("work.bin")), 0o600);

        // The repository stays usable after a panicking action.
        write_primary(&repo, "abc", StateType::Work, b"ok");
        assert_eq!(read_primary(&repo, "abc", StateType::Work), b"ok");
    }

    /// Recorded on open, but never creatable or inspectable
    #[cfg(unix)]
    fn unhardenable_variant(layout: &WriteLayout) -> WriteableStateFile {
        layout.primary().for_included_build(&"x".repeat(300))
    }

    #[test]
    #[cfg(unix)]
    fn action_error_wins_when_hardening_also_fails() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        let result = repo.store_state("abc", StateType::Entry, |layout| -> StateCacheResult<()> {
            layout.primary().open_for_write()?;
            assert!(unhardenable_variant(layout).open_for_write().is_err());
            Err(StateCacheError::io(
                "serializing",
                std::io::Error::other("serializer blew up"),
            ))
        });

        assert!(matches!(result, Err(StateCacheError::Io { context, .. }) if context == "serializing"));
        assert_eq!(mode(&repo.base_dir().join("abc").join("entry.bin")), 0o600);
    }

    #[test]
    #[cfg(unix)]
    fn hardening_error_reported_after_successful_action() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        let result = repo.store_state("abc", StateType::Entry, |layout| -> StateCacheResult<u32> {
            layout.primary().open_for_write()?;
            assert!(unhardenable_variant(layout).open_for_write().is_err());
            Ok(7)
        });

        assert!(matches!(result, Err(StateCacheError::Io { context, .. }) if context.starts_with("inspecting")));
        assert_eq!(mode(&repo.base_dir().join("abc").join("entry.bin")), 0o600);
    }

    #[test]
    fn included_build_variants_are_siblings() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);

        repo.store_state("abc", StateType::Entry, |layout| -> StateCacheResult<()> {
            let nested = layout.primary().for_included_build("B").for_included_build("C");
            assert_eq!(
                nested.path(),
                layout.dir().join("entry.bin.B.C").as_path()
            );
            nested
                .open_for_write()?
                .write_all(b"nested")
                .map_err(|e| StateCacheError::io("writing", e))
        })
        .unwrap();

        let entry = repo.base_dir().join("abc");
        assert!(entry.join("entry.bin.B.C").is_file());
        assert!(!entry.join("entry.bin").exists());
        assert_eq!(
            fs::read_dir(&entry).unwrap().count(),
            1,
            "variants must not create directories"
        );

        let readable = repo
            .load_state("abc", StateType::Entry, |layout| {
                Ok::<_, StateCacheError>((
                    layout.primary().can_read(),
                    layout
                        .primary()
                        .for_included_build("B")
                        .for_included_build("C")
                        .can_read(),
                ))
            })
            .unwrap();
        assert_eq!(readable, (false, true));
    }

    #[test]
    fn mismatched_capabilities_are_unsupported() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        write_primary(&repo, "abc", StateType::Entry, b"x");

        repo.load_state("abc", StateType::Entry, |layout| -> StateCacheResult<()> {
            let reader = AnyStateFile::from(layout.primary().clone());
            assert!(matches!(
                reader.open_for_write(),
                Err(StateCacheError::UnsupportedOperation { .. })
            ));
            assert!(matches!(
                reader.delete(),
                Err(StateCacheError::UnsupportedOperation { .. })
            ));
            Ok(())
        })
        .unwrap();

        repo.store_state("abc", StateType::Entry, |layout| -> StateCacheResult<()> {
            let writer = AnyStateFile::from(layout.primary().clone());
            assert!(!writer.can_read());
            assert!(matches!(
                writer.open_for_read(),
                Err(StateCacheError::UnsupportedOperation { .. })
            ));
            Ok(())
        })
        .unwrap();

        assert_eq!(read_primary(&repo, "abc", StateType::Entry), b"x");
    }

    #[test]
    fn delete_state_file_during_store() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        write_primary(&repo, "abc", StateType::Model, b"stale");

        repo.store_state("abc", StateType::Model, |layout| -> StateCacheResult<()> {
            layout.primary().delete()?;
            let second = layout.primary().delete();
            assert!(matches!(second, Err(StateCacheError::NotFound(_))));
            Ok(())
        })
        .unwrap();

        let readable = repo
            .load_state("abc", StateType::Model, |layout| {
                Ok::<_, StateCacheError>(layout.primary().can_read())
            })
            .unwrap();
        assert!(!readable);
    }

    #[test]
    fn stale_entry_directory_is_reused() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        let entry = repo.base_dir().join("abc");
        fs::create_dir_all(&entry).unwrap();
        fs::write(entry.join("entry.bin"), b"left over").unwrap();
        fs::write(entry.join("work.bin"), b"untouched").unwrap();

        write_primary(&repo, "abc", StateType::Entry, b"fresh");

        assert_eq!(read_primary(&repo, "abc", StateType::Entry), b"fresh");
        assert_eq!(read_primary(&repo, "abc", StateType::Work), b"untouched");
    }

    #[test]
    fn reading_refreshes_entry_access_time() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        write_primary(&repo, "abc", StateType::Entry, b"x");
        let entry = repo.base_dir().join("abc");
        let journal = ModificationTimeJournal::new();
        let old = SystemTime::now() - 30 * DAY;
        journal.set_last_access_time(&entry, old).unwrap();

        // Probing without reading records nothing.
        repo.load_state("abc", StateType::Entry, |layout| {
            Ok::<_, StateCacheError>(layout.primary().can_read())
        })
        .unwrap();
        assert!(journal.get_last_access_time(&entry).unwrap() < old + DAY);

        read_primary(&repo, "abc", StateType::Entry);
        assert!(journal.get_last_access_time(&entry).unwrap() > old + DAY);
    }

    #[test]
    fn storing_refreshes_entry_access_time() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        let entry = repo.base_dir().join("abc");
        fs::create_dir_all(&entry).unwrap();
        let journal = ModificationTimeJournal::new();
        let old = SystemTime::now() - 30 * DAY;
        journal.set_last_access_time(&entry, old).unwrap();

        repo.store_state("abc", StateType::Entry, |_layout| Ok::<_, StateCacheError>(()))
            .unwrap();

        assert!(journal.get_last_access_time(&entry).unwrap() > old + DAY);
    }

    #[test]
    fn shutdown_runs_overdue_lru_cleanup() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        write_primary(&repo, "old", StateType::Entry, b"old");
        write_primary(&repo, "recent", StateType::Entry, b"recent");

        let journal = ModificationTimeJournal::new();
        let base = repo.base_dir().to_path_buf();
        journal
            .set_last_access_time(&base.join("old"), SystemTime::now() - 8 * DAY)
            .unwrap();
        journal
            .set_last_access_time(&base.join(CLEANUP_MARKER_FILENAME), SystemTime::now() - 2 * DAY)
            .unwrap();

        let report = repo.shutdown().unwrap().expect("cleanup should be due");

        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, 1);
        assert!(!base.join("old").exists());
        assert!(base.join("recent").join("entry.bin").exists());
    }

    #[test]
    fn explicit_cleanup_with_age_override() {
        let temp = TempDir::new().unwrap();
        let repo = open(&temp);
        write_primary(&repo, "abc", StateType::Entry, b"x");
        ModificationTimeJournal::new()
            .set_last_access_time(&repo.base_dir().join("abc"), SystemTime::now() - 3 * DAY)
            .unwrap();

        let dry = repo.cleanup(Some(2), true).unwrap();
        assert_eq!(dry.deleted, 1);
        assert!(repo.base_dir().join("abc").exists());

        let kept = repo.cleanup(None, false).unwrap();
        assert_eq!(kept.deleted, 0);

        let removed = repo.cleanup(Some(2), false).unwrap();
        assert_eq!(removed.deleted, 1);
        assert!(!repo.base_dir().join("abc").exists());
    }

    fn assert_stores_exclude_each_other(first: Arc<CacheRepository>, second: Arc<CacheRepository>) {
        let in_store = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = [(first, "key-a"), (second, "key-b")]
            .into_iter()
            .map(|(repo, key)| {
                let in_store = Arc::clone(&in_store);
                let overlapped = Arc::clone(&overlapped);
                thread::spawn(move || {
                    for round in 0..5 {
                        repo.store_state(key, StateType::Entry, |layout| -> StateCacheResult<()> {
                            if in_store.swap(true, Ordering::SeqCst) {
                                overlapped.store(true, Ordering::SeqCst);
                            }
                            let mut out = layout.primary().open_for_write()?;
                            out.write_all(format!("{key}-{round}-begin;").as_bytes())
                                .map_err(|e| StateCacheError::io("writing", e))?;
                            thread::sleep(Duration::from_millis(20));
                            out.write_all(b"end")
                                .map_err(|e| StateCacheError::io("writing", e))?;
                            in_store.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!overlapped.load(Ordering::SeqCst), "stores interleaved");
    }

    #[test]
    #[serial]
    fn stores_for_different_keys_are_serialized() {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(open(&temp));
        assert_stores_exclude_each_other(Arc::clone(&repo), repo);
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn separate_repositories_share_the_file_lock() {
        let temp = TempDir::new().unwrap();
        let first = Arc::new(open(&temp));
        let second = Arc::new(open(&temp));
        assert_stores_exclude_each_other(first, second);
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn statecache(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("statecache");
        cmd.arg("--cache-dir")
            .arg(temp.path().join("cache"))
            .arg("--config")
            .arg(temp.path().join("config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("statecache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("store").and(predicate::str::contains("gc")));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("statecache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("statecache"));
    }

    #[test]
    fn store_then_load_via_stdin() {
        let temp = TempDir::new().unwrap();

        statecache(&temp)
            .args(["store", "abc", "--state", "fingerprint"])
            .write_stdin("v1")
            .assert()
            .success()
            .stdout(predicate::str::contains("Stored 2 bytes"));

        statecache(&temp)
            .args(["load", "abc", "--state", "fingerprint"])
            .assert()
            .success()
            .stdout("v1");
    }

    #[test]
    fn store_from_file_for_included_build() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("payload.bin");
        std::fs::write(&input, "nested payload").unwrap();

        statecache(&temp)
            .args(["store", "abc", "--included-build", "B", "--input"])
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains("entry.bin.B"));

        statecache(&temp)
            .args(["load", "abc", "--included-build", "B"])
            .assert()
            .success()
            .stdout("nested payload");

        statecache(&temp)
            .args(["load", "abc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("State file not found"));
    }

    #[test]
    fn load_missing_key_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        statecache(&temp)
            .args(["load", "missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("State file not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn check_reports_each_outcome() {
        let temp = TempDir::new().unwrap();

        statecache(&temp)
            .args(["check", "abc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not-found"));

        statecache(&temp)
            .args(["store", "abc", "--state", "fingerprint"])
            .write_stdin("")
            .assert()
            .success();
        statecache(&temp)
            .args(["check", "abc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("invalid: fingerprint is empty"));

        statecache(&temp)
            .args(["store", "abc", "--state", "fingerprint"])
            .write_stdin("v1")
            .assert()
            .success();
        statecache(&temp)
            .args(["check", "abc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("abc: valid"));
    }

    #[test]
    fn invalid_key_rejected() {
        let temp = TempDir::new().unwrap();
        statecache(&temp)
            .args(["store", ".hidden"])
            .write_stdin("x")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid cache key"));
    }

    #[test]
    fn list_empty_and_populated() {
        let temp = TempDir::new().unwrap();

        statecache(&temp)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));

        statecache(&temp)
            .args(["store", "abc"])
            .write_stdin("payload")
            .assert()
            .success();

        statecache(&temp)
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"key\": \"abc\""))
            .stdout(predicate::str::contains("entry.bin"));

        statecache(&temp)
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout("abc\n");
    }

    #[test]
    fn gc_dry_run_keeps_fresh_entries() {
        let temp = TempDir::new().unwrap();
        statecache(&temp)
            .args(["store", "abc"])
            .write_stdin("payload")
            .assert()
            .success();

        statecache(&temp)
            .args(["gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Would remove 0 of 1 entries"));
    }

    #[test]
    fn config_path_and_show() {
        let temp = TempDir::new().unwrap();

        statecache(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));

        statecache(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_writes_defaults_once() {
        let temp = TempDir::new().unwrap();

        statecache(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(temp.path().join("config.toml").exists());

        statecache(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }
}
