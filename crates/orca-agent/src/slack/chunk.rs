//! Size-bounded splitting of outbound text.

/// Break `text` into chunks of at most `max_size` characters, breaking at
/// line ends where possible.
///
/// Lines keep their trailing `\n`. A line longer than `max_size` is
/// hard-split; its remainder starts the next chunk. Concatenating the result
/// gives back `text` exactly. Sizes count `char`s, so multi-byte text is
/// never cut inside a character.
#[must_use]
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    let max_size = max_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len <= max_size {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let mut rest = line;
        let mut rest_len = line_len;
        while rest_len > max_size {
            let split_at = rest
                .char_indices()
                .nth(max_size)
                .map_or(rest.len(), |(idx, _)| idx);
            let (piece, tail) = rest.split_at(split_at);
            chunks.push(piece.to_string());
            rest = tail;
            rest_len -= max_size;
        }

        current.push_str(rest);
        current_len = rest_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
