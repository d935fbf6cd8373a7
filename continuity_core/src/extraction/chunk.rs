//! Splitting long documents into oracle-sized chunks.

/// Preferred split points, strongest first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split `text` into chunks of at most `max_chars` characters, with roughly `overlap`
/// characters repeated between neighbours.
///
/// Chunks end at the strongest separator found in the second half of the window, or
/// at the hard limit when there is none. Text within the limit is returned whole.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars / 2);

    // Byte offset of every char, plus the end of the string.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    let total_chars = offsets.len() - 1;

    if total_chars <= max_chars {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + max_chars).min(total_chars);
        if hard_end == total_chars {
            chunks.push(&text[offsets[start]..]);
            break;
        }

        let window = &text[offsets[start]..offsets[hard_end]];
        let min_cut = window.len() / 2;
        let cut = SEPARATORS
            .iter()
            .find_map(|sep| {
                window
                    .rfind(sep)
                    .filter(|&i| i >= min_cut)
                    .map(|i| i + sep.len())
            })
            .unwrap_or(window.len());

        let end_byte = offsets[start] + cut;
        chunks.push(&text[offsets[start]..end_byte]);

        let end_char = offsets.partition_point(|&o| o < end_byte);
        start = end_char.saturating_sub(overlap).max(start + 1);
    }
    chunks
}
