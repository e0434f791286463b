//! Integration tests for the file serving engine.
//!
//! These tests drive the public API against real directory trees:
//! - Alias resolution (file and directory aliases)
//! - Served directory fallback
//! - Containment of traversal attempts
//! - Listing contents and ordering

use std::fs;

use tempfile::TempDir;
use toolbox::config::{AliasConfig, Config, ConfigError};
use toolbox::files::{AliasRegistry, Branch, FileServingEngine, ServerResponse};

/// Build an alias root and a served directory side by side.
///
/// ```text
/// <tmp>/aliases/tools/nc.exe
/// <tmp>/aliases/tools/linux/chisel
/// <tmp>/aliases/payload.txt
/// <tmp>/share/docs/readme.md
/// <tmp>/share/docs/notes.txt
/// <tmp>/share/upload.bin
/// <tmp>/secret.txt
/// ```
fn create_test_engine() -> (FileServingEngine, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();

    fs::create_dir_all(base.join("aliases/tools/linux")).unwrap();
    fs::write(base.join("aliases/tools/nc.exe"), b"MZ\x90\x00nc").unwrap();
    fs::write(base.join("aliases/tools/linux/chisel"), b"\x7fELF").unwrap();
    fs::write(base.join("aliases/payload.txt"), "payload body").unwrap();

    fs::create_dir_all(base.join("share/docs")).unwrap();
    fs::write(base.join("share/docs/readme.md"), "# readme").unwrap();
    fs::write(base.join("share/docs/notes.txt"), "notes").unwrap();
    fs::write(base.join("share/upload.bin"), [0u8, 1, 2, 3]).unwrap();

    fs::write(base.join("secret.txt"), "do not serve").unwrap();

    let records = vec![
        AliasConfig::new("tools", "tools"),
        AliasConfig::new("payload", "payload.txt"),
    ];
    let registry = AliasRegistry::load(&records, &base.join("aliases")).unwrap();
    let engine = FileServingEngine::new(registry, base.join("share"));

    (engine, temp_dir)
}

fn file_content(response: ServerResponse) -> Vec<u8> {
    match response {
        ServerResponse::FileResult { content, .. } => content,
        other => panic!("expected a file, got {:?}", other),
    }
}

// =============================================================================
// Alias Tests
// =============================================================================

#[test]
fn test_file_under_directory_alias() {
    let (engine, _temp_dir) = create_test_engine();

    let response = engine.serve("tools/nc.exe").unwrap();
    assert_eq!(file_content(response), b"MZ\x90\x00nc");
}

#[test]
fn test_nested_file_under_directory_alias() {
    let (engine, _temp_dir) = create_test_engine();

    let response = engine.serve("tools/linux/chisel").unwrap();
    assert_eq!(file_content(response), b"\x7fELF");
}

#[test]
fn test_directory_alias_lists_its_contents() {
    let (engine, _temp_dir) = create_test_engine();

    match engine.serve("tools").unwrap() {
        ServerResponse::DirectoryListing(listing) => {
            let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["linux", "nc.exe"]);

            let paths: Vec<_> = listing
                .entries
                .iter()
                .map(|e| e.virtual_path.as_str())
                .collect();
            assert_eq!(paths, vec!["/tools/linux", "/tools/nc.exe"]);

            // Alias listings never advertise other aliases
            assert!(listing.custom_entries.is_empty());
        }
        other => panic!("expected a listing, got {:?}", other),
    }
}

#[test]
fn test_file_alias_serves_file() {
    let (engine, _temp_dir) = create_test_engine();

    let response = engine.serve("payload").unwrap();
    assert_eq!(file_content(response), b"payload body");
}

#[test]
fn test_file_alias_has_no_subtree() {
    let (engine, _temp_dir) = create_test_engine();

    assert_eq!(
        engine.serve("payload/extra").unwrap(),
        ServerResponse::InvalidPath
    );
}

#[test]
fn test_every_alias_resolves_to_its_local_path() {
    let (engine, _temp_dir) = create_test_engine();

    for alias in engine.registry().entries() {
        let requested = alias.virtual_path.trim_start_matches('/');
        let resolution = engine.resolve(requested).unwrap();

        assert_eq!(resolution.local_path, alias.local_path);
        assert_eq!(
            resolution.branch,
            Branch::Alias {
                virtual_path: alias.virtual_path.clone()
            }
        );
    }
}

#[test]
fn test_trailing_slash_alias_links_resolve() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    fs::create_dir_all(base.join("aliases/tools")).unwrap();
    fs::write(base.join("aliases/tools/nc.exe"), "nc").unwrap();
    fs::create_dir_all(base.join("share")).unwrap();

    let records = vec![AliasConfig::new("/tools/", "tools")];
    let registry = AliasRegistry::load(&records, &base.join("aliases")).unwrap();
    let engine = FileServingEngine::new(registry, base.join("share"));

    let root = match engine.serve("").unwrap() {
        ServerResponse::DirectoryListing(listing) => listing,
        other => panic!("expected a listing, got {:?}", other),
    };
    assert_eq!(root.custom_entries[0].virtual_path, "/tools");

    // Follow the links a client would click
    let alias_href = root.custom_entries[0].virtual_path.trim_start_matches('/');
    let listing = match engine.serve(alias_href).unwrap() {
        ServerResponse::DirectoryListing(listing) => listing,
        other => panic!("expected a listing, got {:?}", other),
    };
    assert_eq!(listing.entries[0].virtual_path, "/tools/nc.exe");

    let file_href = listing.entries[0].virtual_path.trim_start_matches('/');
    assert_eq!(file_content(engine.serve(file_href).unwrap()), b"nc");
}

#[test]
fn test_alias_cannot_replace_served_root() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("p.txt"), "payload").unwrap();

    let mut config = Config::default();
    config.files.serve_directory = temp_dir.path().to_path_buf();
    config.files.alias_root = temp_dir.path().to_path_buf();
    config.files.aliases = vec![AliasConfig::new("", "p.txt")];

    assert_eq!(
        FileServingEngine::from_config(&config).unwrap_err(),
        ConfigError::InvalidServerPath(String::new())
    );
}

#[test]
fn test_alias_shadows_served_directory() {
    let (engine, temp_dir) = create_test_engine();
    fs::create_dir_all(temp_dir.path().join("share/tools")).unwrap();
    fs::write(temp_dir.path().join("share/tools/nc.exe"), "shadowed").unwrap();

    let response = engine.serve("tools/nc.exe").unwrap();
    assert_eq!(file_content(response), b"MZ\x90\x00nc");
}

#[test]
fn test_missing_file_under_alias_does_not_fall_back() {
    let (engine, temp_dir) = create_test_engine();
    fs::create_dir_all(temp_dir.path().join("share/tools")).unwrap();
    fs::write(temp_dir.path().join("share/tools/only-here"), "root copy").unwrap();

    assert_eq!(
        engine.serve("tools/only-here").unwrap(),
        ServerResponse::InvalidPath
    );
}

// =============================================================================
// Served Directory Tests
// =============================================================================

#[test]
fn test_file_in_served_directory() {
    let (engine, _temp_dir) = create_test_engine();

    let response = engine.serve("upload.bin").unwrap();
    assert_eq!(file_content(response), vec![0u8, 1, 2, 3]);
}

#[test]
fn test_subdirectory_listing() {
    let (engine, _temp_dir) = create_test_engine();

    match engine.serve("docs").unwrap() {
        ServerResponse::DirectoryListing(listing) => {
            assert_eq!(listing.requested_path, "docs");

            let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["notes.txt", "readme.md"]);
            assert!(listing.entries.iter().all(|e| e.is_file && !e.is_dir));
            assert_eq!(listing.entries[1].virtual_path, "/docs/readme.md");

            assert!(listing.custom_entries.is_empty());
        }
        other => panic!("expected a listing, got {:?}", other),
    }
}

#[test]
fn test_root_listing_includes_aliases() {
    let (engine, _temp_dir) = create_test_engine();

    match engine.serve("").unwrap() {
        ServerResponse::DirectoryListing(listing) => {
            let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["docs", "upload.bin"]);
            assert!(listing.entries[0].is_dir);

            let custom: Vec<_> = listing
                .custom_entries
                .iter()
                .map(|e| (e.name.as_str(), e.virtual_path.as_str()))
                .collect();
            assert_eq!(custom, vec![("payload", "/payload"), ("tools", "/tools")]);
            assert!(listing.custom_entries[0].is_file);
            assert!(listing.custom_entries[1].is_dir);
        }
        other => panic!("expected a listing, got {:?}", other),
    }
}

#[test]
fn test_unmatched_path_is_invalid() {
    let (engine, _temp_dir) = create_test_engine();

    for requested in ["nope", "docs/missing.md", "tool", "toolsx/nc.exe"] {
        assert_eq!(
            engine.serve(requested).unwrap(),
            ServerResponse::InvalidPath,
            "{} should not resolve",
            requested
        );
    }
}

#[test]
fn test_serve_is_idempotent() {
    let (engine, _temp_dir) = create_test_engine();

    for requested in ["", "docs", "tools", "tools/nc.exe", "payload", "missing"] {
        let first = engine.serve(requested).unwrap();
        let second = engine.serve(requested).unwrap();
        assert_eq!(first, second, "{} changed between calls", requested);
    }
}

// =============================================================================
// Containment Tests
// =============================================================================

#[test]
fn test_traversal_out_of_alias() {
    let (engine, _temp_dir) = create_test_engine();

    assert_eq!(
        engine.serve("tools/../../../etc/passwd").unwrap(),
        ServerResponse::InvalidPath
    );
    // Escapes into the alias root itself, which is still outside `tools`
    assert_eq!(
        engine.serve("tools/../payload.txt").unwrap(),
        ServerResponse::InvalidPath
    );
}

#[test]
fn test_traversal_out_of_served_directory() {
    let (engine, _temp_dir) = create_test_engine();

    for requested in [
        "../secret.txt",
        "docs/../../secret.txt",
        "docs/../../aliases/payload.txt",
        "/etc/passwd",
    ] {
        assert_eq!(
            engine.serve(requested).unwrap(),
            ServerResponse::InvalidPath,
            "{} escaped the served directory",
            requested
        );
    }
}

#[test]
fn test_traversal_that_stays_inside_is_allowed() {
    let (engine, _temp_dir) = create_test_engine();

    let response = engine.serve("docs/../upload.bin").unwrap();
    assert_eq!(file_content(response), vec![0u8, 1, 2, 3]);

    let response = engine.serve("tools/linux/../nc.exe").unwrap();
    assert_eq!(file_content(response), b"MZ\x90\x00nc");
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_is_rejected() {
    let (engine, temp_dir) = create_test_engine();
    std::os::unix::fs::symlink(
        temp_dir.path().join("secret.txt"),
        temp_dir.path().join("share/link.txt"),
    )
    .unwrap();

    assert_eq!(engine.serve("link.txt").unwrap(), ServerResponse::InvalidPath);
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_engine_from_config_with_alias_file() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    fs::create_dir_all(base.join("aliases/tools")).unwrap();
    fs::write(base.join("aliases/tools/nc.exe"), "nc").unwrap();
    fs::create_dir_all(base.join("share")).unwrap();

    let alias_file = base.join("aliases.json");
    fs::write(
        &alias_file,
        r#"{"server": [{"server_path": "tools", "local_path": "tools"}]}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.files.serve_directory = base.join("share");
    config.files.alias_root = base.join("aliases");
    config.files.alias_file = Some(alias_file);

    let engine = FileServingEngine::from_config(&config).unwrap();

    assert_eq!(engine.registry().len(), 1);
    assert!(engine.registry().lookup("/tools").is_some());
    assert_eq!(
        file_content(engine.serve("tools/nc.exe").unwrap()),
        b"nc".to_vec()
    );
}

#[test]
fn test_engine_from_config_rejects_missing_alias_target() {
    let temp_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.files.serve_directory = temp_dir.path().to_path_buf();
    config.files.alias_root = temp_dir.path().to_path_buf();
    config.files.aliases = vec![AliasConfig::new("ghost", "does-not-exist")];

    assert!(FileServingEngine::from_config(&config).is_err());
}

#[test]
fn test_missing_served_directory_serves_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let engine = FileServingEngine::new(AliasRegistry::empty(), temp_dir.path().join("gone"));

    assert_eq!(engine.serve("").unwrap(), ServerResponse::InvalidPath);
    assert_eq!(engine.serve("anything").unwrap(), ServerResponse::InvalidPath);
}
