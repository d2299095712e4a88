//! Edit an ordered set of markdown chapters as one continuous document.
//!
//! The [`app::Composer`] joins the chapter bodies into a single buffer,
//! keeps edits from crossing chapter boundaries, writes changed chapters
//! back after a quiet period and patches in chapters changed on disk.

pub mod app;
