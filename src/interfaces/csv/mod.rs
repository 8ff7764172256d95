//! CSV adapters for batch processing: document and payment readers plus the
//! ledger writer.

pub mod document_reader;
pub mod payment_reader;
pub mod writer;
