mod daily_summaries;
mod sessions;
mod subjects;
