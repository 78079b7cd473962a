/// ETL Pipeline Module
///
/// This module groups the stages the sync pipeline is built from:
/// - Extract: fetch blocks, transactions, and bundle payloads under their
///   respective retry policies
/// - Transform: format fetched records into dataset rows
/// - Load: append rows to the snapshot's flat-file datasets
pub mod extract;
pub mod load;
pub mod parsers;
pub mod transform;
