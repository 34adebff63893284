use text_data::transforms::Tokenize;

/// The alternating two-text corpus used across the pipeline tests:
/// 40 short labeled documents, two distinct texts, two classes.
pub fn corpus() -> (Vec<String>, Vec<String>) {
    let texts: Vec<String> = ["fast ai is a cool project", "hello world"]
        .iter()
        .cycle()
        .take(40)
        .map(|s| s.to_string())
        .collect();
    let labels: Vec<String> = ["neg", "pos"]
        .iter()
        .cycle()
        .take(40)
        .map(|s| s.to_string())
        .collect();
    (texts, labels)
}

/// Default tokenizer for the corpus: whitespace splitting with a
/// beginning-of-document marker, so document boundaries survive
/// concatenation into a language-model stream.
pub fn tokenizer() -> Tokenize {
    Tokenize::new().with_bos()
}
