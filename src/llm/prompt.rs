//! Prompt text sent to the language model.

use crate::models::RetrievedHit;
use crate::retrieval::ContextBundle;

pub const SYSTEM_PROMPT: &str = "\
Role: You are an expert software engineer and code reviewer. You help users understand \
and work with their codebase by answering questions from the repository context that \
accompanies each question.

## Deciding how to answer

1. Greetings and small talk (\"hi\", \"hello\", \"how are you\"): reply warmly, introduce \
yourself as a code review assistant that can explain code, find functions, spot bugs, \
analyze architecture and suggest improvements. Do not use the repository context.
2. Off-topic questions (weather, sports, cooking, general life advice): politely explain \
that you only help with the uploaded code and invite a code question. Do not answer them \
from the repository context.
3. Code questions: answer ONLY from the provided context. If it is not enough, say \
\"I could not find relevant details in the provided repository context\" and suggest which \
files or areas might hold the answer.

## Formatting

- Open with a direct answer of one or two sentences, then explain in sections with `##` \
or `###` headings and blank lines between them.
- Use `-` bullet lists for stacks, features and file descriptions. Reserve tables for \
genuinely comparative data.
- Put code in fenced GitHub-flavored Markdown blocks and name the files, functions and \
classes you reference.
- For file or function summaries use the sections Purpose, Key Components, How It Works, \
Dependencies and, when useful, Usage Examples.
- Keep a professional, conversational tone in active voice. Prefer scannable structure \
and put the most important information first.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Chat prompt: file summary, scored context blocks, then the question.
pub fn build_chat_prompt(bundle: &ContextBundle, question: &str) -> String {
    let files_involved = bundle
        .files
        .iter()
        .map(|f| format!("{} ({})", f.file_name, f.language))
        .collect::<Vec<_>>()
        .join(", ");

    let context = bundle
        .hits
        .iter()
        .map(render_hit)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    format!(
        "Based on the following code context from {} files with {} relevant chunks:\n\n\
         FILES INVOLVED: {files_involved}\n\n\
         CONTEXT:\n{context}\n\n\
         QUESTION: {question}\n\n\
         Please provide a comprehensive answer based on the code context above. \
         Include file names when referencing specific code snippets.\n",
        bundle.file_count(),
        bundle.hits.len(),
    )
}

fn render_hit(hit: &RetrievedHit) -> String {
    format!(
        "**File: {}** (Language: {}, Score: {:.4})\n{}",
        hit.file_name, hit.language, hit.score, hit.text
    )
}

/// Explain a file from chunks that were found in the index.
pub fn build_embedded_explain_prompt(file_name: &str, chunks: &[&str]) -> String {
    let context = chunks.join(CONTEXT_SEPARATOR);
    format!(
        "Please explain the file **{file_name}** based on the following code sections:\n\n\
         {context}\n\n\
         Provide a comprehensive explanation including:\n\
         1. **Purpose**: What this file does\n\
         2. **Key Components**: Main functions, classes, or sections\n\
         3. **Dependencies**: Imports and external dependencies\n\
         4. **Role**: How it fits in the overall project architecture\n"
    )
}

/// Explain a file from its contents read straight off disk.
pub fn build_direct_explain_prompt(
    file_name: &str,
    size_kb: u64,
    content: &str,
    was_truncated: bool,
) -> String {
    let mut prompt =
        format!("Please explain the file **{file_name}** (Size: {size_kb}KB):\n\n{content}\n\n");
    prompt.push_str(
        "Note: This file was not embedded in the vector database, so it is being read directly.",
    );
    if was_truncated {
        prompt.push_str(" Content is truncated due to size.");
    }
    prompt.push_str(
        "\n\nPlease provide:\n\
         1. **Purpose**: What this file does\n\
         2. **Key Components**: Main functions, classes, sections\n\
         3. **Dependencies**: Imports and external dependencies\n\
         4. **Configuration**: If it's a config file, explain the settings\n\
         5. **Role**: How it fits in the project\n",
    );
    prompt
}
