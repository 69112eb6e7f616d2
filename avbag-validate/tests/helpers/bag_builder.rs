//! Preservation bag fixture builder
//!
//! Builds complete bags on disk for end-to-end tests: payload files and
//! conformant JSON sidecars first, then `seal()` writes the bag
//! declaration, a real md5 manifest, a correct Payload-Oxum and a
//! tagmanifest computed from what was actually written. Tests perturb
//! the sealed bag to produce the defect under study.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use avbag_common::checksum::{hash_file, Algorithm};
use walkdir::WalkDir;

/// Sidecar record fields shared by the fixture generators
#[derive(Debug, Clone)]
pub struct RecordConfig {
    pub format: &'static str,
    pub file_format: &'static str,
    pub audio_codec: &'static str,
    pub duration_ms: f64,
}

impl RecordConfig {
    /// A digitized-from-DAT FLAC master
    pub fn flac() -> Self {
        Self {
            format: "audio cassette digital",
            file_format: "FLAC",
            audio_codec: "FLAC",
            duration_ms: 30_000.0,
        }
    }

    /// An analog-source WAV master
    pub fn wav() -> Self {
        Self {
            format: "audio cassette analog",
            file_format: "WAV",
            audio_codec: "PCM",
            duration_ms: 30_000.0,
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self::flac()
    }
}

/// Configuration for generated WAV audio
#[derive(Debug, Clone)]
pub struct WavConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for WavConfig {
    /// The preservation-master target profile for audio
    fn default() -> Self {
        Self {
            duration_seconds: 0.5,
            sample_rate: 96_000,
            channels: 2,
            bits_per_sample: 24,
        }
    }
}

/// Generate a WAV file with a 440 Hz tone
pub fn generate_wav(path: &Path, config: &WavConfig) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: config.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;
    let peak = ((1i64 << (config.bits_per_sample - 1)) - 1) as f32;

    for i in 0..total_samples {
        let t = i as f32 / config.sample_rate as f32;
        let sample = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * peak) as i32;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Builder for one bag directory under a test parent
pub struct BagBuilder {
    root: PathBuf,
    with_tagmanifest: bool,
}

impl BagBuilder {
    pub fn new(parent: &Path, name: &str) -> Self {
        let root = parent.join(name);
        fs::create_dir_all(&root).unwrap();
        Self {
            root,
            with_tagmanifest: true,
        }
    }

    pub fn without_tagmanifest(mut self) -> Self {
        self.with_tagmanifest = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
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

    /// Write a media file plus its conformant JSON sidecar under the
    /// given role directory. `file_name` carries the extension
    /// (`abc_123456_v01_pm.flac`).
    pub fn master(&self, role_dir: &str, file_name: &str, content: &[u8], record: &RecordConfig) {
        self.file(&format!("data/{}/{}", role_dir, file_name), content);

        let (file_root, extension) = file_name
            .rsplit_once('.')
            .expect("master file name carries an extension");
        let sidecar = self.record_json(file_root, extension, content.len() as u64, record);
        self.file(
            &format!("data/{}/{}.json", role_dir, file_root),
            sidecar.as_bytes(),
        );
    }

    /// Generate a real WAV master plus a sidecar whose technical block
    /// matches the generated audio, so only deliberate divergences show
    /// up in deep mode.
    pub fn master_wav(
        &self,
        role_dir: &str,
        file_root: &str,
        wav: &WavConfig,
        record: &RecordConfig,
    ) {
        let rel = format!("data/{}/{}.wav", role_dir, file_root);
        let path = self.root.join(&rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        generate_wav(&path, wav).unwrap();

        let size = fs::metadata(&path).unwrap().len();
        let mut record = record.clone();
        record.duration_ms = wav.duration_seconds * 1000.0;
        let sidecar = self.record_json(file_root, "wav", size, &record);
        self.file(
            &format!("data/{}/{}.json", role_dir, file_root),
            sidecar.as_bytes(),
        );
    }

    fn record_json(
        &self,
        file_root: &str,
        extension: &str,
        file_size: u64,
        record: &RecordConfig,
    ) -> String {
        let bag_name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let division = bag_name.split('_').next().unwrap_or("myd").to_string();
        let primary_id = bag_name.rsplit('_').next().unwrap_or(&bag_name).to_string();
        let role = file_root.rsplit('_').next().unwrap_or("pm").to_string();

        serde_json::json!({
            "asset": {
                "referenceFilename": format!("{}.{}", file_root, extension),
                "fileRole": role
            },
            "bibliographic": { "primaryID": primary_id, "division": division },
            "source": {
                "object": { "type": "audio cassette", "format": record.format }
            },
            "technical": {
                "filename": file_root,
                "extension": extension,
                "fileFormat": record.file_format,
                "audioCodec": record.audio_codec,
                "dateCreated": "2024-03-18",
                "fileSize": { "measure": file_size, "unit": "bytes" },
                "durationMilli": { "measure": record.duration_ms, "unit": "ms" }
            }
        })
        .to_string()
    }

    /// Write bagit.txt, a real md5 manifest over everything under
    /// data/, a bag-info.txt with the correct Payload-Oxum, and (unless
    /// disabled) a tagmanifest covering the tag files. Returns the bag
    /// root.
    pub fn seal(&self) -> PathBuf {
        let bagit = b"BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n";
        self.file("bagit.txt", bagit);

        let mut manifest = String::new();
        let mut bytes: u64 = 0;
        let mut count: u64 = 0;
        for (rel, path) in self.payload_files() {
            let digest = hash_file(Algorithm::Md5, &path).unwrap();
            manifest.push_str(&format!("{}  {}\n", digest, rel));
            bytes += fs::metadata(&path).unwrap().len();
            count += 1;
        }
        self.file("manifest-md5.txt", manifest.as_bytes());

        let bag_info = format!(
            "Bagging-Date: 2024-03-18\nSource-Organization: Media Preservation Lab\nPayload-Oxum: {}.{}\n",
            bytes, count
        );
        self.file("bag-info.txt", bag_info.as_bytes());

        if self.with_tagmanifest {
            let mut tagmanifest = String::new();
            for tag in ["bag-info.txt", "bagit.txt", "manifest-md5.txt"] {
                let digest = hash_file(Algorithm::Md5, &self.root.join(tag)).unwrap();
                tagmanifest.push_str(&format!("{}  {}\n", digest, tag));
            }
            self.file("tagmanifest-md5.txt", tagmanifest.as_bytes());
        }

        self.root.clone()
    }

    /// Every regular file under data/, as (manifest rel path, abs path),
    /// sorted by rel path
    fn payload_files(&self) -> Vec<(String, PathBuf)> {
        let data = self.root.join("data");
        let mut files = Vec::new();
        if !data.is_dir() {
            return files;
        }
        for entry in WalkDir::new(&data).follow_links(false).sort_by_file_name() {
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
            files.push((rel, entry.path().to_path_buf()));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }
}
