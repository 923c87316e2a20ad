//! Shared helpers for kernel integration tests.

use std::io::Write;

use aimlbot::Kernel;

/// Wrap category markup in an AIML 1.0.1 document.
pub fn document(categories: &str) -> String {
    format!(r#"<aiml version="1.0.1">{}</aiml>"#, categories)
}

/// Teach categories to an existing kernel from an in-memory snippet.
pub fn learn_str(kernel: &Kernel, categories: &str) {
    let mut file = tempfile::NamedTempFile::new().expect("create temp aiml file");
    file.write_all(document(categories).as_bytes())
        .expect("write temp aiml file");
    file.flush().expect("flush temp aiml file");
    kernel
        .learn(file.path().to_str().expect("utf-8 temp path"))
        .expect("learn temp aiml file");
}

/// Build a kernel that has learned the given category markup.
pub fn kernel_with(categories: &str) -> Kernel {
    let kernel = Kernel::new();
    learn_str(&kernel, categories);
    kernel
}
