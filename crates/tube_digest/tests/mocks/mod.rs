// Not every test binary exercises every mock.
#![allow(dead_code)]

pub mod chat_model;
pub mod media_source;
pub mod meta_store;
pub mod segmenter;
pub mod summarizer;
pub mod transcriber;
