use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Error types for the annotation module.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// Error reading the annotation file.
    #[error("error reading annotation file")]
    Io(#[from] std::io::Error),

    /// A line does not follow `label idx0 idx1 ... idxK trailer`.
    #[error("line {line}: {reason}")]
    Format {
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// An index points past the end of the point cloud it is checked against.
    #[error("label {label}: index {index} out of range for {len} points")]
    IndexOutOfRange {
        /// Object label.
        label: String,
        /// The offending index.
        index: usize,
        /// Number of points in the cloud.
        len: usize,
    },
}

/// Ground-truth segmentation of one point cloud: object label to point indices.
///
/// Labels are kept in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationIndex {
    entries: Vec<(String, Vec<usize>)>,
}

impl AnnotationIndex {
    /// Parse the content of an annotation file.
    ///
    /// Every non-empty line is `label idx0 idx1 ... idxK trailer`. The trailing
    /// token is discarded. A label repeated later in the file replaces the
    /// earlier indices.
    ///
    /// Example:
    /// ```
    /// use scenechange_3d::io::annotation::AnnotationIndex;
    ///
    /// let index = AnnotationIndex::parse_str("cup 0 1 2 3\nbowl 7 8 2\n").unwrap();
    /// assert_eq!(index.get("cup"), Some(&[0, 1, 2][..]));
    /// assert_eq!(index.labels().collect::<Vec<_>>(), vec!["cup", "bowl"]);
    /// ```
    pub fn parse_str(content: &str) -> Result<Self, AnnotationError> {
        let mut index = Self::default();
        for (i, line) in content.lines().enumerate() {
            if let Some((label, indices)) = parse_line(line, i + 1)? {
                index.insert(label, indices);
            }
        }
        Ok(index)
    }

    /// Read an annotation file.
    pub fn read_annotation(path: impl AsRef<Path>) -> Result<Self, AnnotationError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        let mut index = Self::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some((label, indices)) = parse_line(&line, i + 1)? {
                index.insert(label, indices);
            }
        }

        log::debug!("read {} labels from {}", index.len(), path.display());

        Ok(index)
    }

    fn insert(&mut self, label: String, indices: Vec<usize>) {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => {
                log::warn!("label {label} annotated twice, keeping the last entry");
                entry.1 = indices;
            }
            None => self.entries.push((label, indices)),
        }
    }

    /// The point indices of a label.
    pub fn get(&self, label: &str) -> Option<&[usize]> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, indices)| indices.as_slice())
    }

    /// The labels in file order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(label, indices)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.entries
            .iter()
            .map(|(l, indices)| (l.as_str(), indices.as_slice()))
    }

    /// Check that every index is valid for a point cloud of `len` points.
    pub fn validate_against(&self, len: usize) -> Result<(), AnnotationError> {
        for (label, indices) in self.iter() {
            if let Some(&index) = indices.iter().find(|&&i| i >= len) {
                return Err(AnnotationError::IndexOutOfRange {
                    label: label.to_string(),
                    index,
                    len,
                });
            }
        }
        Ok(())
    }
}

fn parse_line(line: &str, number: usize) -> Result<Option<(String, Vec<usize>)>, AnnotationError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    let (label, rest) = match parts.split_first() {
        Some(split) => split,
        None => return Ok(None),
    };

    // the last token is a trailer, not an index
    let indices = match rest.split_last() {
        Some((_, indices)) => indices,
        None => {
            return Err(AnnotationError::Format {
                line: number,
                reason: format!("missing trailing token after label {label}"),
            })
        }
    };

    let indices = indices
        .iter()
        .map(|s| {
            s.parse::<usize>().map_err(|e| AnnotationError::Format {
                line: number,
                reason: format!("{s}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some((label.to_string(), indices)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_str() -> Result<(), AnnotationError> {
        let index = AnnotationIndex::parse_str("mug 4 5 6 3\n\nplant 10 11 2\nbook 0\n")?;
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("mug"), Some(&[4, 5, 6][..]));
        assert_eq!(index.get("plant"), Some(&[10, 11][..]));
        assert_eq!(index.get("book"), Some(&[][..]));
        assert_eq!(index.get("chair"), None);
        assert_eq!(index.labels().collect::<Vec<_>>(), vec!["mug", "plant", "book"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_label_replaced() -> Result<(), AnnotationError> {
        let index = AnnotationIndex::parse_str("a 1 2 0\nb 3 0\na 9 0\n")?;
        assert_eq!(index.labels().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(index.get("a"), Some(&[9][..]));
        Ok(())
    }

    #[test]
    fn test_format_errors() {
        let res = AnnotationIndex::parse_str("cup 1 2 3\nbowl 4 x 2\n");
        assert!(matches!(res, Err(AnnotationError::Format { line: 2, .. })));

        let res = AnnotationIndex::parse_str("cup\n");
        assert!(matches!(res, Err(AnnotationError::Format { line: 1, .. })));

        let res = AnnotationIndex::parse_str("cup -1 0\n");
        assert!(matches!(res, Err(AnnotationError::Format { line: 1, .. })));
    }

    #[test]
    fn test_validate_against() -> Result<(), AnnotationError> {
        let index = AnnotationIndex::parse_str("cup 0 1 2 3\nbowl 3 4 2\n")?;
        index.validate_against(5)?;
        assert!(matches!(
            index.validate_against(4),
            Err(AnnotationError::IndexOutOfRange { index: 4, len: 4, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_read_annotation() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "chair 1 2 3 4 5 5")?;
        writeln!(file, "table 6 7 2")?;

        let index = AnnotationIndex::read_annotation(file.path())?;
        let collected = index.iter().collect::<Vec<_>>();
        assert_eq!(
            collected,
            vec![("chair", &[1, 2, 3, 4, 5][..]), ("table", &[6, 7][..])]
        );
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let res = AnnotationIndex::read_annotation("/nonexistent/annotation.anno");
        assert!(matches!(res, Err(AnnotationError::Io(_))));
    }
}
