//! Text extraction.
//!
//! A [`TextExtractor`] turns a file into a stream of UTF-8 text bytes. Plain
//! files are streamed as-is, Office Open XML documents are unpacked on the
//! blocking pool and PDFs go through an external command.

use crate::error::{DetectError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use senswatch_core::ExtractorConfig;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::debug;

/// Placeholder replaced by the input path in extractor commands.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Boxed text stream returned by extractors.
pub type TextStream = Box<dyn AsyncRead + Send + Unpin>;

static DOCX_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>")
        .expect("docx run regex is hardcoded and valid")
});

static PPTX_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<a:t(?:\s[^>]*)?>([^<]*)</a:t>").expect("pptx run regex is hardcoded and valid")
});

static XLSX_SHARED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<t(?:\s[^>]*)?>([^<]*)</t>").expect("xlsx string regex is hardcoded and valid")
});

static XLSX_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<v>([^<]*)</v>").expect("xlsx value regex is hardcoded and valid")
});

static XML_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|(amp|lt|gt|quot|apos));")
        .expect("entity regex is hardcoded and valid")
});

/// A source of text for one kind of file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Whether this extractor handles the file.
    fn handles(&self, path: &Path) -> bool;

    /// Open the file's text stream.
    async fn open(&self, path: &Path) -> Result<TextStream>;
}

/// Lower-case extension without the dot.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// Check if a file should be scanned given the skip list.
#[must_use]
pub fn is_scannable(path: &Path, skip_extensions: &[String]) -> bool {
    match extension_of(path) {
        Some(ext) => !skip_extensions.iter().any(|skip| skip.eq_ignore_ascii_case(&ext)),
        None => true,
    }
}

/// Streams the file bytes directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn handles(&self, _path: &Path) -> bool {
        true
    }

    async fn open(&self, path: &Path) -> Result<TextStream> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }
}

/// Office Open XML documents: `.docx`, `.pptx` and `.xlsx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipXmlExtractor;

#[async_trait]
impl TextExtractor for ZipXmlExtractor {
    fn name(&self) -> &'static str {
        "zip-xml"
    }

    fn handles(&self, path: &Path) -> bool {
        matches!(
            extension_of(path).as_deref(),
            Some("docx" | "pptx" | "xlsx")
        )
    }

    async fn open(&self, path: &Path) -> Result<TextStream> {
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extract_office_text(&owned)).await??;
        Ok(Box::new(Cursor::new(text.into_bytes())))
    }
}

fn extract_office_text(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    match extension_of(path).as_deref() {
        Some("docx") => {
            let xml = read_entry(&mut archive, "word/document.xml")?;
            Ok(docx_text(&xml))
        }
        Some("pptx") => {
            let slides = numbered_entries(&archive, "ppt/slides/slide");
            let mut text = String::new();
            for name in slides {
                let xml = read_entry(&mut archive, &name)?;
                text.push_str(&pptx_slide_text(&xml));
                text.push('\n');
            }
            Ok(text)
        }
        Some("xlsx") => {
            let mut text = String::new();
            if archive.file_names().any(|name| name == "xl/sharedStrings.xml") {
                let xml = read_entry(&mut archive, "xl/sharedStrings.xml")?;
                text.push_str(&joined_captures(&XLSX_SHARED, &xml, "\t"));
                text.push('\n');
            }
            for name in numbered_entries(&archive, "xl/worksheets/sheet") {
                let xml = read_entry(&mut archive, &name)?;
                text.push_str(&joined_captures(&XLSX_VALUE, &xml, "\t"));
                text.push('\n');
            }
            Ok(text)
        }
        _ => Err(DetectError::Extract {
            path: path.to_path_buf(),
            reason: "not an office document".to_string(),
        }),
    }
}

fn read_entry<R>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<String>
where
    R: std::io::Read + std::io::Seek,
{
    let mut entry = archive.by_name(name)?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Entries `{prefix}N.xml`, ordered by N.
fn numbered_entries<R>(archive: &zip::ZipArchive<R>, prefix: &str) -> Vec<String>
where
    R: std::io::Read + std::io::Seek,
{
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, name)| name).collect()
}

fn docx_text(xml: &str) -> String {
    let mut text = String::new();
    for caps in DOCX_RUN.captures_iter(xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => text.push('\n'),
        }
    }
    text
}

fn pptx_slide_text(xml: &str) -> String {
    joined_captures(&PPTX_RUN, xml, " ")
}

fn joined_captures(pattern: &Regex, xml: &str, separator: &str) -> String {
    pattern
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|run| unescape_xml(run.as_str()))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Replace predefined and numeric XML entities.
#[must_use]
pub fn unescape_xml(text: &str) -> String {
    XML_ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                match caps.get(3).map(|name| name.as_str()) {
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Runs an external command and reads the text from its stdout.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    extensions: Vec<String>,
    argv: Vec<String>,
}

impl CommandExtractor {
    /// Create an extractor for the given extensions. `argv[0]` is the program;
    /// [`INPUT_PLACEHOLDER`] in any argument is replaced by the file path.
    #[must_use]
    pub fn new(extensions: &[&str], argv: Vec<String>) -> Self {
        Self {
            extensions: extensions.iter().map(|ext| ext.to_lowercase()).collect(),
            argv,
        }
    }
}

#[async_trait]
impl TextExtractor for CommandExtractor {
    fn name(&self) -> &'static str {
        "command"
    }

    fn handles(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    async fn open(&self, path: &Path) -> Result<TextStream> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(DetectError::Extract {
                path: path.to_path_buf(),
                reason: "no command configured".to_string(),
            });
        };

        let input = path.to_string_lossy();
        let output = tokio::process::Command::new(program)
            .args(args.iter().map(|arg| arg.replace(INPUT_PLACEHOLDER, &input)))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DetectError::Extract {
                path: path.to_path_buf(),
                reason: format!(
                    "{program} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        debug!(
            "Extracted {} bytes from {} via {}",
            output.stdout.len(),
            path.display(),
            program
        );
        Ok(Box::new(Cursor::new(output.stdout)))
    }
}

/// Ordered extractor dispatch with a plain text fallback.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn TextExtractor>>,
    fallback: PlainTextExtractor,
}

impl ExtractorSet {
    /// Plain text only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
            fallback: PlainTextExtractor,
        }
    }

    /// Office documents, plus PDFs when a command is configured.
    #[must_use]
    pub fn from_config(config: &ExtractorConfig) -> Self {
        let mut set = Self::new().with(Box::new(ZipXmlExtractor));
        if !config.pdf_command.is_empty() {
            set = set.with(Box::new(CommandExtractor::new(
                &["pdf"],
                config.pdf_command.clone(),
            )));
        }
        set
    }

    /// Add an extractor; earlier extractors take precedence.
    #[must_use]
    pub fn with(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// The extractor responsible for a path.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> &dyn TextExtractor {
        self.extractors
            .iter()
            .find(|extractor| extractor.handles(path))
            .map_or(&self.fallback as &dyn TextExtractor, |extractor| extractor.as_ref())
    }

    /// Open a file's text stream with the responsible extractor.
    pub async fn open(&self, path: &Path) -> Result<TextStream> {
        let extractor = self.for_path(path);
        debug!("Opening {} with {} extractor", path.display(), extractor.name());
        extractor.open(path).await
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.extractors.iter().map(|e| e.name()).collect();
        f.debug_struct("ExtractorSet")
            .field("extractors", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).expect("create archive");
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(body.as_bytes()).expect("write entry");
        }
        writer.finish().expect("finish archive");
    }

    async fn read_all(mut stream: TextStream) -> String {
        let mut text = String::new();
        stream.read_to_string(&mut text).await.expect("read stream");
        text
    }

    #[test]
    fn test_is_scannable() {
        let skip: Vec<String> = ["png", "exe", "zip"].iter().map(ToString::to_string).collect();
        assert!(is_scannable(Path::new("notes.txt"), &skip));
        assert!(is_scannable(Path::new("Makefile"), &skip));
        assert!(is_scannable(Path::new("report.docx"), &skip));
        assert!(!is_scannable(Path::new("photo.PNG"), &skip));
        assert!(!is_scannable(Path::new("setup.exe"), &skip));
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(unescape_xml("&#20013;&#x6587;"), "中文");
        assert_eq!(unescape_xml("&quot;x&apos;"), "\"x'");
        assert_eq!(unescape_xml("&bogus; &#xFFFFFF;"), "&bogus; &#xFFFFFF;");
    }

    #[test]
    fn test_dispatch() {
        let set = ExtractorSet::from_config(&ExtractorConfig {
            pdf_command: vec!["pdftotext".to_string(), "{input}".to_string(), "-".to_string()],
            recognizer_command: Vec::new(),
        });
        assert_eq!(set.for_path(Path::new("a.DOCX")).name(), "zip-xml");
        assert_eq!(set.for_path(Path::new("a.pdf")).name(), "command");
        assert_eq!(set.for_path(Path::new("a.txt")).name(), "plain");

        let plain_only = ExtractorSet::from_config(&ExtractorConfig::default());
        assert_eq!(plain_only.for_path(Path::new("a.pdf")).name(), "plain");
    }

    #[tokio::test]
    async fn test_plain_text() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "phone 13812345678").expect("write file");

        let text = read_all(ExtractorSet::new().open(&path).await.unwrap()).await;
        assert_eq!(text, "phone 13812345678");
    }

    #[tokio::test]
    async fn test_docx_text() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("letter.docx");
        write_zip(
            &path,
            &[(
                "word/document.xml",
                r#"<w:document><w:body><w:p><w:r><w:t>身份证 1101011990</w:t></w:r><w:r><w:t xml:space="preserve">03074514</w:t></w:r></w:p><w:p><w:r><w:t>A &amp; B</w:t></w:r></w:p></w:body></w:document>"#,
            )],
        );

        let text = read_all(ZipXmlExtractor.open(&path).await.unwrap()).await;
        assert_eq!(text, "身份证 110101199003074514\nA & B\n");
    }

    #[tokio::test]
    async fn test_pptx_slides_in_numeric_order() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("deck.pptx");
        write_zip(
            &path,
            &[
                ("ppt/slides/slide10.xml", "<p:sld><a:t>ten</a:t></p:sld>"),
                ("ppt/slides/slide2.xml", "<p:sld><a:t>two</a:t><a:t>b</a:t></p:sld>"),
                ("ppt/slides/slide1.xml", "<p:sld><a:t>one</a:t></p:sld>"),
                ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
            ],
        );

        let text = read_all(ZipXmlExtractor.open(&path).await.unwrap()).await;
        assert_eq!(text, "one\ntwo b\nten\n");
    }

    #[tokio::test]
    async fn test_xlsx_strings_and_values() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("sheet.xlsx");
        write_zip(
            &path,
            &[
                ("xl/sharedStrings.xml", "<sst><si><t>name</t></si><si><t>phone</t></si></sst>"),
                (
                    "xl/worksheets/sheet1.xml",
                    "<c><v>0</v></c><c><v>13812345678</v></c>",
                ),
            ],
        );

        let text = read_all(ZipXmlExtractor.open(&path).await.unwrap()).await;
        assert_eq!(text, "name\tphone\n0\t13812345678\n");
    }

    #[tokio::test]
    async fn test_corrupt_archive() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("broken.docx");
        std::fs::write(&path, "not a zip").expect("write file");

        let result = ZipXmlExtractor.open(&path).await;
        assert!(matches!(result, Err(DetectError::Archive(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_extractor() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("doc.pdf");
        std::fs::write(&path, "mail bob@corp.cn").expect("write file");

        let cat = CommandExtractor::new(&["pdf"], vec!["cat".to_string(), "{input}".to_string()]);
        let text = read_all(cat.open(&path).await.unwrap()).await;
        assert_eq!(text, "mail bob@corp.cn");

        let failing = CommandExtractor::new(&["pdf"], vec!["false".to_string()]);
        let result = failing.open(&path).await;
        assert!(matches!(result, Err(DetectError::Extract { .. })));
    }
}
