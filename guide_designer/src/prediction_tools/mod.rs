pub mod candidate_scanner;
pub mod cfd_specificity;
pub mod doench_efficiency;
pub mod mismatch_decoder;
pub mod ranking;
pub mod weight_tables;
