use clap::Parser;
use molexaudio::batch::resolve_max_workers;
use molexaudio::engine::report::{Summary, write_json, write_table};
use molexaudio::engine::tools::{collect_media_files, is_supported_media, scan_media_files};
use molexaudio::engine::{Cli, Commands, validate_opts};
use molexaudio::utils::WorkerThreadLimits;
use molexaudio::utils::molex_toml::{apply_file_to_opts, load_molex_toml, parse_molex_toml};
use molexaudio::{EncodeSettings, Operation, Opts, ResultEntry, ResultStatus};
use std::fs;
use std::path::{Path, PathBuf};

fn opts_for(path: &Path, operation: Operation) -> Opts {
    Opts {
        path: path.to_path_buf(),
        operation,
        dry_run: false,
        workers: None,
        settings: EncodeSettings::default(),
        verbose: false,
        json: false,
    }
}

fn entry(file: &str, status: ResultStatus, message: Option<&str>) -> ResultEntry {
    ResultEntry {
        file: PathBuf::from(file),
        task: "normalize".to_string(),
        status,
        message: message.map(str::to_string),
    }
}

// --- argument parsing ---

#[test]
fn test_parse_normalize_with_flags() {
    let cli = Cli::try_parse_from([
        "molexaudio",
        "normalize",
        "/media",
        "--dry-run",
        "--workers",
        "3",
        "--target-i",
        "-23",
    ])
    .unwrap();
    let common = cli.command.common();
    assert_eq!(common.path, PathBuf::from("/media"));
    assert!(common.dry_run);
    assert_eq!(common.workers.as_deref(), Some("3"));
    assert_eq!(cli.command.operation(), Operation::Normalize);
    match cli.command {
        Commands::Normalize { target_i, target_tp, .. } => {
            assert_eq!(target_i, Some(-23.0));
            assert_eq!(target_tp, None);
        }
        Commands::Boost { .. } => panic!("expected normalize"),
    }
}

#[test]
fn test_parse_boost_negative_percentage_and_globals() {
    let cli = Cli::try_parse_from(["molexaudio", "--json", "boost", "song.mp3", "-25", "-v"]).unwrap();
    assert!(cli.json);
    assert!(cli.verbose);
    assert_eq!(cli.command.operation(), Operation::Boost { percent: -25.0 });
    assert!(!cli.command.common().dry_run);
}

#[test]
fn test_parse_rejects_bad_input() {
    assert!(Cli::try_parse_from(["molexaudio", "boost", "song.mp3", "loud"]).is_err());
    assert!(Cli::try_parse_from(["molexaudio", "boost", "song.mp3"]).is_err());
    assert!(Cli::try_parse_from(["molexaudio", "normalize"]).is_err());
    assert!(Cli::try_parse_from(["molexaudio"]).is_err());
}

#[test]
fn test_workers_flag_kept_as_text() {
    let cli = Cli::try_parse_from(["molexaudio", "normalize", ".", "--workers", "many"]).unwrap();
    assert_eq!(cli.command.common().workers.as_deref(), Some("many"));
}

// --- worker count coercion ---

#[test]
fn test_resolve_max_workers() {
    let detected = WorkerThreadLimits::current().detected();
    assert!(detected >= 1);
    assert_eq!(resolve_max_workers(Some("4")), 4);
    assert_eq!(resolve_max_workers(Some(" 2 ")), 2);
    assert_eq!(resolve_max_workers(Some("0")), 1);
    assert_eq!(resolve_max_workers(Some("-3")), 1);
    assert_eq!(resolve_max_workers(Some("lots")), detected);
    assert_eq!(resolve_max_workers(Some("")), detected);
    assert_eq!(resolve_max_workers(None), detected);
}

// --- validation ---

#[test]
fn test_validate_opts() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_opts(&opts_for(dir.path(), Operation::Normalize)).is_ok());
    assert!(validate_opts(&opts_for(dir.path(), Operation::Boost { percent: -99.0 })).is_ok());
    assert!(validate_opts(&opts_for(dir.path(), Operation::Boost { percent: -100.0 })).is_err());
    assert!(validate_opts(&opts_for(dir.path(), Operation::Boost { percent: f64::NAN })).is_err());
    let missing = dir.path().join("nope");
    assert!(validate_opts(&opts_for(&missing, Operation::Normalize)).is_err());
}

// --- config file ---

#[test]
fn test_config_file_applies_present_fields() {
    let file = parse_molex_toml(
        r#"
        [settings]
        workers = 3
        codec = "aac"
        target_i = -23.0
        verbose = true
        "#,
    )
    .unwrap();
    let mut opts = opts_for(Path::new("."), Operation::Normalize);
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.workers.as_deref(), Some("3"));
    assert_eq!(opts.settings.audio_codec, "aac");
    assert_eq!(opts.settings.audio_bitrate, "256k");
    assert_eq!(opts.settings.loudnorm.integrated, -23.0);
    assert_eq!(opts.settings.loudnorm.true_peak, -1.5);
    assert!(opts.verbose);
    assert!(!opts.dry_run);
}

#[test]
fn test_config_file_load() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_molex_toml(dir.path()).unwrap().is_none());
    fs::write(
        dir.path().join(".molexaudio.toml"),
        "[settings]\nbitrate = \"320k\"\n",
    )
    .unwrap();
    let file = load_molex_toml(dir.path()).unwrap().unwrap();
    let mut opts = opts_for(dir.path(), Operation::Normalize);
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.settings.audio_bitrate, "320k");

    fs::write(dir.path().join(".molexaudio.toml"), "[settings\nbroken").unwrap();
    assert!(load_molex_toml(dir.path()).is_err());
}

// --- media scan ---

#[test]
fn test_is_supported_media() {
    assert!(is_supported_media(Path::new("a.mkv")));
    assert!(is_supported_media(Path::new("A.MP4")));
    assert!(is_supported_media(Path::new("dir/b.flac")));
    assert!(!is_supported_media(Path::new("notes.txt")));
    assert!(!is_supported_media(Path::new("noext")));
}

#[test]
fn test_scan_media_files_recursive_sorted_without_temp() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("season1")).unwrap();
    for name in [
        "b.mkv",
        "a.mp3",
        "readme.txt",
        "a_temp_processing.mp3",
        "._b.mkv",
        "season1/ep2.MKV",
        "season1/ep1.mkv",
    ] {
        fs::write(root.join(name), b"x").unwrap();
    }
    let files = scan_media_files(root);
    let expected: Vec<PathBuf> = ["a.mp3", "b.mkv", "season1/ep1.mkv", "season1/ep2.MKV"]
        .iter()
        .map(|n| root.join(n))
        .collect();
    assert_eq!(files, expected);
}

#[test]
fn test_collect_media_files_single_file_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clip.mov");
    fs::write(&file, b"x").unwrap();
    assert_eq!(collect_media_files(&file).unwrap(), vec![file.clone()]);
    let err = collect_media_files(&dir.path().join("missing")).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

// --- report ---

#[test]
fn test_summary_counts() {
    let results = vec![
        entry("a", ResultStatus::Success, None),
        entry("b", ResultStatus::Failed, Some("boom")),
        entry("c", ResultStatus::DryRun, None),
        entry("d", ResultStatus::Success, None),
    ];
    let s = Summary::from_results(&results);
    assert_eq!(
        s,
        Summary {
            total: 4,
            succeeded: 2,
            failed: 1,
            dry_run: 1
        }
    );
}

#[test]
fn test_write_table_lists_every_entry() {
    colored::control::set_override(false);
    let results = vec![
        entry("/m/show/b.mkv", ResultStatus::Failed, Some("boom")),
        entry("/m/show/a.mkv", ResultStatus::Success, None),
    ];
    let mut out = Vec::new();
    write_table(&mut out, &results, Some(Path::new("/m"))).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("Status"));
    assert!(lines[1].starts_with("Failed"));
    assert!(lines[1].contains("show/b.mkv"));
    assert!(lines[1].ends_with("boom"));
    assert!(lines[2].starts_with("Success"));
    assert!(text.contains("2 file(s): 1 succeeded, 1 failed, 0 dry run"));
}

#[test]
fn test_write_json() {
    let results = vec![
        entry("a.mkv", ResultStatus::DryRun, Some("Dry Run: would normalize loudness")),
        entry("b.mkv", ResultStatus::Success, None),
    ];
    let mut out = Vec::new();
    write_json(&mut out, &results).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["summary"]["total"], 2);
    assert_eq!(value["summary"]["dry_run"], 1);
    assert_eq!(value["results"][0]["status"], "DryRun");
    assert_eq!(value["results"][0]["file"], "a.mkv");
    assert!(value["results"][1].get("message").is_none());
}
