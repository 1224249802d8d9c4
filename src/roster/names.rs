use super::vocab::Vocabulary;

/// Walk upward from the line above the anchor and take the first line that is
/// neither blank nor a header label. Returns `None` when a block boundary or the
/// top of the text is reached first.
pub fn resolve_name<'a>(lines: &[&'a str], anchor: usize, vocab: &Vocabulary) -> Option<&'a str> {
    for &line in lines[..anchor.min(lines.len())].iter().rev() {
        if vocab.is_boundary(line) {
            return None;
        }
        if line.is_empty() || vocab.is_structural(line) {
            continue;
        }
        return Some(line);
    }
    None
}
