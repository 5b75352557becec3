mod crawler;

pub use crawler::Crawler;
