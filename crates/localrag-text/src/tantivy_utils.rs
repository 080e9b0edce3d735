use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, StopWordFilter, TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "chunk_text";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	schema_builder.add_text_field("doc_id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn build_analyzer() -> TextAnalyzer {
	let stop_words = [
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	TextAnalyzer::builder(CjkBigramTokenizer)
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.iter().map(|s| s.to_string())))
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, build_analyzer());
}

/// Han, kana and hangul: scripts written without spaces between words.
pub fn is_cjk(c: char) -> bool {
	matches!(c,
		'\u{3005}' | '\u{3040}'..='\u{30FF}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}'
		| '\u{AC00}'..='\u{D7AF}' | '\u{F900}'..='\u{FAFF}' | '\u{FF66}'..='\u{FF9F}')
}

/// Splits alphanumeric runs into words like `SimpleTokenizer`, and CJK runs
/// into overlapping character bigrams. A lone CJK character is one token.
#[derive(Clone, Default)]
pub struct CjkBigramTokenizer;

pub struct CjkBigramStream {
	tokens: Vec<Token>,
	next: usize,
}

impl Tokenizer for CjkBigramTokenizer {
	type TokenStream<'a> = CjkBigramStream;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> CjkBigramStream {
		CjkBigramStream { tokens: tokenize(text), next: 0 }
	}
}

impl TokenStream for CjkBigramStream {
	fn advance(&mut self) -> bool {
		if self.next >= self.tokens.len() { return false; }
		self.next += 1;
		true
	}

	fn token(&self) -> &Token { &self.tokens[self.next - 1] }

	fn token_mut(&mut self) -> &mut Token { &mut self.tokens[self.next - 1] }
}

fn tokenize(text: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let chars: Vec<(usize, char)> = text.char_indices().collect();
	let end_of = |i: usize| chars.get(i).map_or(text.len(), |&(o, _)| o);
	let push = |from: usize, to: usize, tokens: &mut Vec<Token>| {
		let position = tokens.len();
		tokens.push(Token { offset_from: from, offset_to: to, position, text: text[from..to].to_string(), position_length: 1 });
	};

	let mut i = 0;
	while i < chars.len() {
		let c = chars[i].1;
		if is_cjk(c) {
			let start = i;
			while i < chars.len() && is_cjk(chars[i].1) { i += 1; }
			if i - start == 1 {
				push(chars[start].0, end_of(start + 1), &mut tokens);
			} else {
				for j in start..i - 1 { push(chars[j].0, end_of(j + 2), &mut tokens); }
			}
		} else if c.is_alphanumeric() {
			let start = i;
			while i < chars.len() && chars[i].1.is_alphanumeric() && !is_cjk(chars[i].1) { i += 1; }
			push(chars[start].0, end_of(i), &mut tokens);
		} else {
			i += 1;
		}
	}
	tokens
}

#[cfg(test)]
mod tests {
	use super::*;

	fn texts(input: &str) -> Vec<String> {
		let mut analyzer = build_analyzer();
		let mut stream = analyzer.token_stream(input);
		let mut out = Vec::new();
		while stream.advance() { out.push(stream.token().text.clone()); }
		out
	}

	#[test]
	fn latin_words_are_lowercased_and_stop_words_dropped() {
		assert_eq!(texts("The Rocket stove, 89.2%"), vec!["rocket", "stove", "89", "2"]);
	}

	#[test]
	fn cjk_runs_become_bigrams() {
		assert_eq!(texts("加入率は89%"), vec!["加入", "入率", "率は", "89"]);
		assert_eq!(texts("年 金"), vec!["年", "金"]);
		assert_eq!(texts("BGE-M3の埋め込み"), vec!["bge", "m3", "の埋", "埋め", "め込", "込み"]);
	}
}
