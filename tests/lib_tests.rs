mod common;

use clap::CommandFactory;
use common::{small_tree, write_file};
use std::time::Duration;
use treesum::engine::arg_parser::Cli;
use treesum::engine::{format_size, render_tree};
use treesum::utils::{
    KILOBYTE, MEGABYTE, apply_file_to_opts, cap_threads_by_fd_limit, load_treesum_toml,
    parse_treesum_toml,
};
use treesum::{Opts, ReducerKind, StrategyChoice, StrategyKind};

// --- format_size ---

#[test]
fn test_format_size_zero_and_bytes() {
    assert_eq!(format_size(0), "0B");
    assert_eq!(format_size(1023), "1023B");
}

#[test]
fn test_format_size_skips_empty_units() {
    assert_eq!(format_size(5 * MEGABYTE), "5MB");
    assert_eq!(format_size(2 * MEGABYTE + 3 * KILOBYTE), "2MB 3KB");
    assert_eq!(format_size(3 * 1024 * MEGABYTE + 7), "3GB 7B");
}

// --- strategy / reducer names ---

#[test]
fn test_strategy_names_round_trip() {
    for kind in StrategyKind::ALL {
        assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
    }
    assert_eq!(
        "Fork_Join".parse::<StrategyKind>().unwrap(),
        StrategyKind::ForkJoin
    );
    assert!("bogus".parse::<StrategyKind>().is_err());
}

#[test]
fn test_strategy_choice_all() {
    assert_eq!("all".parse::<StrategyChoice>().unwrap(), StrategyChoice::All);
    assert_eq!(StrategyChoice::All.kinds().len(), StrategyKind::ALL.len());
    assert_eq!(
        "queue".parse::<StrategyChoice>().unwrap().kinds(),
        vec![StrategyKind::Queue]
    );
    assert_eq!(
        StrategyChoice::default(),
        StrategyChoice::One(StrategyKind::ForkJoin)
    );
}

#[test]
fn test_reducer_aliases() {
    assert_eq!("size".parse::<ReducerKind>().unwrap(), ReducerKind::Bytes);
    assert_eq!("files".parse::<ReducerKind>().unwrap(), ReducerKind::Count);
    assert_eq!("HASH".parse::<ReducerKind>().unwrap(), ReducerKind::Digest);
    assert!("median".parse::<ReducerKind>().is_err());
}

// --- .treesum.toml ---

#[test]
fn test_config_file_overrides_defaults() {
    let file = parse_treesum_toml(
        r#"
        [settings]
        strategy = "all"
        threads = 3
        timeout = 2.5
        task_timeout = 10
        reducer = "count"
        repeat = 4
        json = true
        "#,
    )
    .unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts).unwrap();
    assert_eq!(opts.strategy, StrategyChoice::All);
    assert_eq!(opts.threads, Some(3));
    assert_eq!(opts.timeout, Some(Duration::from_millis(2500)));
    assert_eq!(opts.task_timeout, Duration::from_secs(10));
    assert_eq!(opts.reducer, ReducerKind::Count);
    assert_eq!(opts.repeat, 4);
    assert!(opts.json);
    assert!(!opts.verbose);
}

#[test]
fn test_config_file_partial_keeps_defaults() {
    let file = parse_treesum_toml("[settings]\nverbose = true\n").unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts).unwrap();
    assert!(opts.verbose);
    assert_eq!(opts.strategy, StrategyChoice::default());
    assert_eq!(opts.repeat, 1);
    assert_eq!(opts.timeout, None);
}

#[test]
fn test_config_file_bad_values() {
    let file = parse_treesum_toml("[settings]\nstrategy = \"teleport\"\n").unwrap();
    assert!(apply_file_to_opts(&file, &mut Opts::default()).is_err());

    let file = parse_treesum_toml("[settings]\ntimeout = -1.0\n").unwrap();
    assert!(apply_file_to_opts(&file, &mut Opts::default()).is_err());

    assert!(parse_treesum_toml("[settings]\nthreads = \"many\"\n").is_err());
}

#[test]
fn test_load_config_from_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    assert!(load_treesum_toml(dir.path()).unwrap().is_none());

    std::fs::write(
        dir.path().join(".treesum.toml"),
        "[settings]\nreducer = \"digest\"\n",
    )
    .unwrap();
    let file = load_treesum_toml(dir.path()).unwrap().unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts).unwrap();
    assert_eq!(opts.reducer, ReducerKind::Digest);

    std::fs::write(dir.path().join(".treesum.toml"), "not toml [").unwrap();
    assert!(load_treesum_toml(dir.path()).is_err());
}

// --- tree rendering ---

#[test]
fn test_render_tree_layout() {
    let tree = small_tree();
    let out = render_tree(tree.path());
    let lines: Vec<&str> = out.lines().skip(1).collect();
    assert_eq!(
        lines,
        vec![
            "    |---a.txt 10",
            "    |---b",
            "    |    |---c.txt 20",
            "    |    |---d",
            "    |    |    |---e.txt 30",
            "    |---empty",
            "    |---f.txt 5",
        ]
    );
}

#[test]
fn test_render_tree_skips_hidden_directories() {
    let tree = small_tree();
    write_file(tree.path(), ".git/objects/blob", 99);
    write_file(tree.path(), ".hidden-file", 1);
    let out = render_tree(tree.path());
    assert!(!out.contains(".git"));
    assert!(!out.contains("blob"));
    assert!(out.contains("|---.hidden-file 1"));
}

// --- fd limit ---

#[test]
fn test_thread_cap_never_below_one() {
    assert!(cap_threads_by_fd_limit(1) >= 1);
    assert!(cap_threads_by_fd_limit(4) <= 4);
}

// --- CLI help ---

#[test]
fn test_task_timeout_help_says_when_to_raise_it() {
    let help = Cli::command().render_long_help().to_string();
    let help = help.split_whitespace().collect::<Vec<_>>().join(" ");
    assert!(help.contains("--task-timeout"));
    assert!(help.contains("raise this for large or slow trees"));
}
