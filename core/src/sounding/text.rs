use crate::sounding::{
    select_sounding, LoadedProfile, ProfileError, ProfileLevel, ProfileSource, SoundingRecord,
    DEFAULT_PROFILE_MISSING,
};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Free-text columnar sounding file, re-read on every `read` call.
///
/// ```text
/// # comment
/// launch 2024-05-01T12:00:00Z
/// source KOUN
/// missing -9999
/// 350.0   2.1  -4.0
/// 1200.0  5.3  -2.2
/// ```
///
/// Each `launch` directive starts a new sounding; data lines are
/// `altitude_m u_mps v_mps`.
pub struct TextProfileSource {
    path: PathBuf,
    look_back: Duration,
    profile: LoadedProfile,
}

impl TextProfileSource {
    pub fn new<P: AsRef<Path>>(path: P, look_back: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let source = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "text".into());
        Self {
            path,
            look_back,
            profile: LoadedProfile {
                missing_value: DEFAULT_PROFILE_MISSING,
                source,
                ..Default::default()
            },
        }
    }
}

impl ProfileSource for TextProfileSource {
    fn read(&mut self, time: DateTime<Utc>) -> Result<usize, ProfileError> {
        self.profile.clear();
        let contents = fs::read_to_string(&self.path).map_err(|source| ProfileError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records = parse_soundings(&contents)?;
        Ok(select_sounding(&records, time, self.look_back)
            .map(|record| self.profile.load(record))
            .unwrap_or(0))
    }

    fn u(&self) -> &[f64] {
        &self.profile.u
    }

    fn v(&self) -> &[f64] {
        &self.profile.v
    }

    fn altitudes(&self) -> &[f64] {
        &self.profile.altitudes
    }

    fn missing_value(&self) -> f64 {
        self.profile.missing_value
    }

    fn launch_time(&self) -> Option<DateTime<Utc>> {
        self.profile.launch_time
    }

    fn source_name(&self) -> &str {
        &self.profile.source
    }
}

/// Parses every sounding in a text profile file.
pub fn parse_soundings(contents: &str) -> Result<Vec<SoundingRecord>, ProfileError> {
    let mut records: Vec<SoundingRecord> = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(head) = fields.next() else {
            continue;
        };
        match head {
            "launch" => {
                let value = fields.next().ok_or_else(|| parse_error(line_no, "launch needs a time"))?;
                let launch_time = DateTime::parse_from_rfc3339(value)
                    .map_err(|err| parse_error(line_no, &format!("bad launch time: {}", err)))?
                    .with_timezone(&Utc);
                records.push(SoundingRecord {
                    launch_time,
                    source: String::new(),
                    missing_value: DEFAULT_PROFILE_MISSING,
                    levels: Vec::new(),
                });
            }
            "source" => {
                let name = fields.collect::<Vec<_>>().join(" ");
                current(&mut records, line_no)?.source = name;
            }
            "missing" => {
                let value = parse_number(fields.next(), line_no, "missing value")?;
                current(&mut records, line_no)?.missing_value = value;
            }
            _ => {
                let altitude = parse_number(Some(head), line_no, "altitude")?;
                let u = parse_number(fields.next(), line_no, "u")?;
                let v = parse_number(fields.next(), line_no, "v")?;
                current(&mut records, line_no)?
                    .levels
                    .push(ProfileLevel { altitude, u, v });
            }
        }
    }
    Ok(records)
}

fn current(
    records: &mut [SoundingRecord],
    line: usize,
) -> Result<&mut SoundingRecord, ProfileError> {
    records
        .last_mut()
        .ok_or_else(|| parse_error(line, "data before the first launch directive"))
}

fn parse_number(field: Option<&str>, line: usize, what: &str) -> Result<f64, ProfileError> {
    let field = field.ok_or_else(|| parse_error(line, &format!("missing {}", what)))?;
    field
        .parse::<f64>()
        .map_err(|_| parse_error(line, &format!("bad {} '{}'", what, field)))
}

fn parse_error(line: usize, message: &str) -> ProfileError {
    ProfileError::Parse {
        line,
        message: message.to_string(),
    }
}
