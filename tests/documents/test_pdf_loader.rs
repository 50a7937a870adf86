// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! PDF text extraction against PDFs generated with lopdf

use doc_chatter::documents::{load_pdf_bytes, DocumentError, PdfLoader};

use crate::common::{biology_pdf, build_pdf};

#[tokio::test]
async fn test_extracts_one_page_per_pdf_page() {
    let pages = load_pdf_bytes("biology.pdf", biology_pdf()).await.unwrap();

    assert_eq!(pages.len(), 2);
    assert!(pages[0].content.contains("Photosynthesis"));
    assert!(pages[1].content.contains("Mitochondria"));

    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.metadata.source, "biology.pdf");
        assert_eq!(page.metadata.page, i);
    }
}

#[tokio::test]
async fn test_pdf_without_text_is_rejected() {
    let blank: &[&str] = &[];
    let bytes = build_pdf(&[blank]);

    let result = load_pdf_bytes("blank.pdf", bytes).await;

    assert!(matches!(result, Err(DocumentError::NoText)));
}

#[tokio::test]
async fn test_temp_file_removed_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let loader = PdfLoader::new().with_temp_dir(dir.path());

    let pages = loader.load("biology.pdf", biology_pdf()).await.unwrap();
    assert_eq!(pages.len(), 2);

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_truncated_pdf_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let loader = PdfLoader::new().with_temp_dir(dir.path());

    let mut bytes = biology_pdf();
    bytes.truncate(bytes.len() / 3);

    let result = loader.load("truncated.pdf", bytes).await;

    assert!(result.is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
