use lexinbox_core::{
    LemmaNormalizer, Normalization, NormalizedItem, NormalizerConfig, RuleApplied, SkipReason,
};

fn normalize(text: &str) -> NormalizedItem {
    match LemmaNormalizer::default().normalize(text) {
        Normalization::Item(item) => item,
        Normalization::Skip(reason) => panic!("`{text}` was skipped: {reason}"),
    }
}

fn assert_lemma(text: &str, lemma: &str, rule: RuleApplied) {
    let item = normalize(text);
    assert_eq!(item.lemma, lemma, "lemma for `{text}`");
    assert_eq!(item.rule_applied, rule, "rule for `{text}`");
}

#[test]
fn infinitive_collapses_to_the_verb() {
    assert_lemma("I have to print this page.", "print", RuleApplied::ToVerb);
    assert_lemma("Remember to   Call the dentist", "call", RuleApplied::ToVerb);
}

#[test]
fn stopword_remainder_picks_the_longest_content_word() {
    assert_lemma("we will be at the airport", "airport", RuleApplied::ContentLongest);
    assert_lemma(
        "Keep the refrigerator organized",
        "refrigerator",
        RuleApplied::ContentLongest,
    );
    assert_lemma("This is the page.", "page", RuleApplied::ContentLongest);
}

#[test]
fn short_phrases_are_kept_verbatim() {
    assert_lemma("that's it", "that's it", RuleApplied::ShortPhrase);
    assert_lemma("  Romantic   date ", "Romantic date", RuleApplied::ShortPhrase);
    assert_lemma("calm", "calm", RuleApplied::ShortPhrase);
}

#[test]
fn imperative_instruction_keeps_the_whole_phrase() {
    let text = "Short back and sides, longer on top.";
    let item = normalize(text);
    assert_eq!(item.lemma, text);
    assert_eq!(item.display_text, text);
    assert_eq!(item.rule_applied, RuleApplied::PhraseExtended);
}

#[test]
fn declarative_sentence_of_extended_length_is_not_kept_intact() {
    let item = normalize("The train was late, again.");
    assert_eq!(item.rule_applied, RuleApplied::ContentLongest);
    assert_eq!(item.lemma, "train");
}

#[test]
fn special_tokens_win_over_longer_words() {
    assert_lemma("Pay the rent on Friday please", "rent", RuleApplied::ContentSpecial);

    let config = NormalizerConfig {
        special_tokens: vec!["Friday".to_string()],
        ..NormalizerConfig::default()
    };
    let item = LemmaNormalizer::new(&config)
        .normalize("Pay the rent on Friday please")
        .item()
        .cloned()
        .expect("item");
    assert_eq!(item.lemma, "friday");
    assert_eq!(item.rule_applied, RuleApplied::ContentSpecial);
}

#[test]
fn all_stopword_fragment_falls_back_to_first_tokens() {
    assert_lemma(
        "what is it about them",
        "what is it",
        RuleApplied::FallbackFirstTokens,
    );
}

#[test]
fn punctuated_sentence_with_a_content_word_is_not_noise() {
    let normalizer = LemmaNormalizer::default();
    let item = normalizer
        .normalize("This is the page.")
        .item()
        .cloned()
        .expect("content word kept");
    assert_eq!(item.lemma, "page");
    assert_eq!(item.display_text, "This is the page.");
}

#[test]
fn all_stopword_sentence_is_skipped() {
    assert_eq!(
        LemmaNormalizer::default().normalize("it is what it is."),
        Normalization::Skip(SkipReason::Sentence)
    );
}

#[test]
fn blank_and_punctuation_only_text_is_skipped() {
    let normalizer = LemmaNormalizer::default();
    assert_eq!(normalizer.normalize("   "), Normalization::Skip(SkipReason::Blank));
    assert_eq!(normalizer.normalize("... !"), Normalization::Skip(SkipReason::Blank));
}

#[test]
fn extra_stopwords_extend_the_builtin_list() {
    let config = NormalizerConfig {
        extra_stopwords: vec!["Please".to_string(), "friday".to_string()],
        special_tokens: Vec::new(),
        ..NormalizerConfig::default()
    };
    let normalizer = LemmaNormalizer::new(&config);
    assert!(normalizer.is_stopword("please"));

    let item = normalizer
        .normalize("Pay the rent on Friday please")
        .item()
        .cloned()
        .expect("item");
    assert_eq!(item.lemma, "rent");
    assert_eq!(item.rule_applied, RuleApplied::ContentLongest);
}

#[test]
fn normalization_is_deterministic() {
    let normalizer = LemmaNormalizer::default();
    let text = "Could you bring the umbrella tomorrow";
    assert_eq!(normalizer.normalize(text), normalizer.normalize(text));
}
