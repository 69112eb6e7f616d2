//! Test helper utilities
//!
//! Minimal sealed-bag fixtures for repair tests: payload plus a
//! conformant sidecar, then a manifest, Payload-Oxum and tagmanifest
//! computed from the files actually on disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use avbag_common::checksum::{hash_file, Algorithm};
use walkdir::WalkDir;

/// Stand-in FLAC payload; repair never parses media content
pub const FLAC: &[u8] = b"fLaC\x00\x00\x00\x22 fixture master audio payload";

pub struct BagBuilder {
    root: PathBuf,
}

impl BagBuilder {
    pub fn new(parent: &Path, name: &str) -> Self {
        let root = parent.join(name);
        fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    /// Write an arbitrary file under the bag root
    pub fn file(&self, rel: &str, content: &[u8]) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
    }

    /// Write a FLAC master plus its conformant JSON sidecar under the
    /// given role directory
    pub fn master(&self, role_dir: &str, file_name: &str, content: &[u8]) {
        self.file(&format!("data/{}/{}", role_dir, file_name), content);

        let (file_root, extension) = file_name
            .rsplit_once('.')
            .expect("master file name carries an extension");
        let bag_name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let division = bag_name.split('_').next().unwrap_or("myd").to_string();
        let primary_id = bag_name.rsplit('_').next().unwrap_or(&bag_name).to_string();
        let role = file_root.rsplit('_').next().unwrap_or("pm").to_string();

        let sidecar = serde_json::json!({
            "asset": { "referenceFilename": file_name, "fileRole": role },
            "bibliographic": { "primaryID": primary_id, "division": division },
            "source": {
                "object": { "type": "audio cassette", "format": "audio cassette digital" }
            },
            "technical": {
                "filename": file_root,
                "extension": extension,
                "fileFormat": "FLAC",
                "audioCodec": "FLAC",
                "fileSize": { "measure": content.len(), "unit": "bytes" },
                "durationMilli": { "measure": 30000, "unit": "ms" }
            }
        })
        .to_string();
        self.file(
            &format!("data/{}/{}.json", role_dir, file_root),
            sidecar.as_bytes(),
        );
    }

    /// Write bagit.txt, a real md5 manifest over everything under
    /// data/, a bag-info.txt with the correct Payload-Oxum and a
    /// tagmanifest. Returns the bag root.
    pub fn seal(&self) -> PathBuf {
        let bagit = b"BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n";
        self.file("bagit.txt", bagit);

        let mut manifest = String::new();
        let mut bytes: u64 = 0;
        let mut count: u64 = 0;
        for entry in WalkDir::new(self.root.join("data"))
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.unwrap();
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let digest = hash_file(Algorithm::Md5, entry.path()).unwrap();
            manifest.push_str(&format!("{}  {}\n", digest, rel));
            bytes += entry.metadata().unwrap().len();
            count += 1;
        }
        self.file("manifest-md5.txt", manifest.as_bytes());

        let bag_info = format!(
            "Bagging-Date: 2024-03-18\nSource-Organization: Media Preservation Lab\nPayload-Oxum: {}.{}\n",
            bytes, count
        );
        self.file("bag-info.txt", bag_info.as_bytes());

        let mut tagmanifest = String::new();
        for tag in ["bag-info.txt", "bagit.txt", "manifest-md5.txt"] {
            let digest = hash_file(Algorithm::Md5, &self.root.join(tag)).unwrap();
            tagmanifest.push_str(&format!("{}  {}\n", digest, tag));
        }
        self.file("tagmanifest-md5.txt", tagmanifest.as_bytes());

        self.root.clone()
    }
}
