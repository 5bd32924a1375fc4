//! Change log line classification.
//!
//! The filesystem watcher writes one event per line, the event text
//! following a log prefix:
//!
//! ```text
//! 2024-03-15 09:30:05,123 - INFO - 文件修改事件: /docs/a.txt
//! 2024-03-15 09:30:06,456 - INFO - 文件移动/重命名事件: /docs/a.txt -> /docs/b.txt
//! ```

use senswatch_core::WatchConfig;
use std::path::PathBuf;

/// One filesystem change read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// File content changed or the file was created
    Modify(PathBuf),
    /// File moved or renamed
    Move {
        /// Previous path
        from: PathBuf,
        /// New path
        to: PathBuf,
    },
    /// File removed
    Delete(PathBuf),
}

/// Turns log lines into [`ChangeEvent`]s using configurable markers.
#[derive(Debug, Clone)]
pub struct EventParser {
    modify_marker: String,
    create_marker: String,
    move_marker: String,
    delete_marker: String,
    move_separator: String,
}

impl EventParser {
    /// Parser using the markers of a watch configuration.
    #[must_use]
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            modify_marker: config.modify_marker.clone(),
            create_marker: config.create_marker.clone(),
            move_marker: config.move_marker.clone(),
            delete_marker: config.delete_marker.clone(),
            move_separator: config.move_separator.clone(),
        }
    }

    /// Classify one line. Lines without a known marker, or with an empty
    /// path, yield `None`.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<ChangeEvent> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(path) = after_marker(line, &self.modify_marker) {
            return Some(ChangeEvent::Modify(PathBuf::from(path)));
        }
        if let Some(path) = after_marker(line, &self.create_marker) {
            return Some(ChangeEvent::Modify(PathBuf::from(path)));
        }
        if let Some(rest) = after_marker(line, &self.move_marker) {
            let mut parts = rest.split(self.move_separator.as_str());
            return match (parts.next(), parts.next(), parts.next()) {
                (Some(from), Some(to), None) if !from.is_empty() && !to.is_empty() => {
                    Some(ChangeEvent::Move {
                        from: PathBuf::from(from),
                        to: PathBuf::from(to),
                    })
                }
                _ => None,
            };
        }
        if let Some(path) = after_marker(line, &self.delete_marker) {
            return Some(ChangeEvent::Delete(PathBuf::from(path)));
        }
        None
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new(&WatchConfig::default())
    }
}

fn after_marker<'l>(line: &'l str, marker: &str) -> Option<&'l str> {
    if marker.is_empty() {
        return None;
    }
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modify_with_log_prefix() {
        let parser = EventParser::default();
        assert_eq!(
            parser.parse_line("2024-03-15 09:30:05,123 - INFO - 文件修改事件: /docs/a.txt"),
            Some(ChangeEvent::Modify(PathBuf::from("/docs/a.txt")))
        );
    }

    #[test]
    fn test_create_is_modify() {
        let parser = EventParser::default();
        assert_eq!(
            parser.parse_line("文件创建事件: /docs/new.txt\r"),
            Some(ChangeEvent::Modify(PathBuf::from("/docs/new.txt")))
        );
    }

    #[test]
    fn test_parse_move() {
        let parser = EventParser::default();
        assert_eq!(
            parser.parse_line("x - INFO - 文件移动/重命名事件: /docs/a.txt -> /docs/b.txt"),
            Some(ChangeEvent::Move {
                from: PathBuf::from("/docs/a.txt"),
                to: PathBuf::from("/docs/b.txt"),
            })
        );
    }

    #[test]
    fn test_parse_delete_keeps_spaces_in_path() {
        let parser = EventParser::default();
        assert_eq!(
            parser.parse_line("文件删除事件: /docs/my report.docx"),
            Some(ChangeEvent::Delete(PathBuf::from("/docs/my report.docx")))
        );
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let parser = EventParser::default();
        assert_eq!(parser.parse_line(""), None);
        assert_eq!(parser.parse_line("2024-03-15 - INFO - 监控已启动"), None);
        assert_eq!(parser.parse_line("文件修改事件: "), None);
        assert_eq!(parser.parse_line("文件移动/重命名事件: /docs/a.txt"), None);
        assert_eq!(
            parser.parse_line("文件移动/重命名事件: /a -> /b -> /c"),
            None
        );
        assert_eq!(parser.parse_line("文件移动/重命名事件:  -> /b"), None);
    }

    #[test]
    fn test_custom_markers() {
        let config = WatchConfig {
            modify_marker: "MODIFIED ".to_string(),
            create_marker: "CREATED ".to_string(),
            move_marker: "MOVED ".to_string(),
            delete_marker: "DELETED ".to_string(),
            move_separator: " => ".to_string(),
            ..WatchConfig::default()
        };
        let parser = EventParser::new(&config);

        assert_eq!(
            parser.parse_line("MOVED /a => /b"),
            Some(ChangeEvent::Move {
                from: PathBuf::from("/a"),
                to: PathBuf::from("/b"),
            })
        );
        assert_eq!(
            parser.parse_line("DELETED /a"),
            Some(ChangeEvent::Delete(PathBuf::from("/a")))
        );
        assert_eq!(parser.parse_line("文件修改事件: /a"), None);
    }
}
