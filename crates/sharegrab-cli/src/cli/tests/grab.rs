//! Tests for the grab subcommand.

use super::parse;
use clap::Parser;
use crate::cli::commands::{format_result, read_link_list, resolve_dest_dir};
use crate::cli::CliCommand;
use sharegrab_core::config::GrabConfig;
use sharegrab_core::error::{AdapterError, PipelineError, Stage};
use sharegrab_core::pipeline::batch::BatchResult;
use sharegrab_core::pipeline::PipelineOutcome;
use sharegrab_core::resolver::Resolution;
use sharegrab_core::{MediaDescriptor, MediaItem, MediaKind, ResourceId};
use std::path::{Path, PathBuf};

#[test]
fn cli_parse_grab_links() {
    match parse(&[
        "sharegrab",
        "grab",
        "https://b23.tv/kuWFjoV",
        "https://v.douyin.com/c-NqAPROei8/",
    ]) {
        CliCommand::Grab {
            links,
            list,
            dir,
            jobs,
            fail_fast,
        } => {
            assert_eq!(links.len(), 2);
            assert!(!fail_fast);
            assert_eq!(links[0], "https://b23.tv/kuWFjoV");
            assert!(list.is_none());
            assert!(dir.is_none());
            assert!(jobs.is_none());
        }
        _ => panic!("expected Grab"),
    }
}

#[test]
fn cli_parse_grab_options() {
    match parse(&[
        "sharegrab",
        "grab",
        "--list",
        "links.txt",
        "--dir",
        "/tmp/media",
        "--jobs",
        "8",
        "--fail-fast",
    ]) {
        CliCommand::Grab {
            links,
            list,
            dir,
            jobs,
            fail_fast,
        } => {
            assert!(fail_fast);
            assert!(links.is_empty());
            assert_eq!(list.as_deref(), Some(Path::new("links.txt")));
            assert_eq!(dir.as_deref(), Some(Path::new("/tmp/media")));
            assert_eq!(jobs, Some(8));
        }
        _ => panic!("expected Grab with options"),
    }
}

#[test]
fn cli_parse_grab_rejects_bad_jobs() {
    assert!(crate::cli::Cli::try_parse_from(["sharegrab", "grab", "--jobs", "many"]).is_err());
}

#[test]
fn link_list_skips_blanks_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("links.txt");
    std::fs::write(
        &path,
        "# weekend\nhttps://b23.tv/kuWFjoV\n\n   https://v.kuaishou.com/K03QpTh3  \n#https://skipped\n",
    )
    .unwrap();
    assert_eq!(
        read_link_list(&path).unwrap(),
        vec!["https://b23.tv/kuWFjoV", "https://v.kuaishou.com/K03QpTh3"]
    );
    assert!(read_link_list(&dir.path().join("missing.txt")).is_err());
}

#[test]
fn dest_dir_precedence() {
    let mut cfg = GrabConfig::default();
    cfg.download_dir = Some(PathBuf::from("/srv/media"));
    assert_eq!(
        resolve_dest_dir(Some(PathBuf::from("/tmp/x")), &cfg).unwrap(),
        PathBuf::from("/tmp/x")
    );
    assert_eq!(resolve_dest_dir(None, &cfg).unwrap(), PathBuf::from("/srv/media"));
    assert_eq!(
        resolve_dest_dir(None, &GrabConfig::default()).unwrap(),
        std::env::current_dir().unwrap()
    );
}

#[test]
fn result_lines() {
    let descriptor = MediaDescriptor::new(
        "clip",
        vec![MediaItem::new(MediaKind::Video, "https://cdn/clip.mp4", "mp4")],
    )
    .unwrap();
    let ok = BatchResult {
        input: "https://a/1".to_string(),
        result: Ok(PipelineOutcome {
            adapter: "example".to_string(),
            resolution: Resolution {
                original_url: "https://a/1".to_string(),
                final_url: "https://a/video/1".to_string(),
                resource_id: ResourceId::new("1").unwrap(),
                hops: 1,
            },
            descriptor,
            files: vec![PathBuf::from("/tmp/clip.mp4"), PathBuf::from("/tmp/clip.m4a")],
        }),
    };
    assert_eq!(format_result(&ok), "ok /tmp/clip.mp4 /tmp/clip.m4a");

    let failed = BatchResult {
        input: "https://a/2".to_string(),
        result: Err(PipelineError::new(
            Stage::Extracting,
            AdapterError::ParseFailure("marker window.__DATA__= not found".to_string()),
        )),
    };
    let line = format_result(&failed);
    assert!(line.starts_with("failed at extracting: parse_failure: "));
    assert!(line.contains("window.__DATA__="));
}
