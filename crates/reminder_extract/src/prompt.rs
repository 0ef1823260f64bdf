use chrono::{Datelike, NaiveDate};

/// Instruction text sent with the user's words. `today` lets the service
/// resolve relative dates such as "tomorrow".
pub fn build_prompt(text: &str, today: NaiveDate) -> String {
    format!(
        "Analyze the following text and extract the appointment details.\n\
         Today's date is {today}.\n\
         The current year is {year}.\n\
         \n\
         Text: \"{text}\"\n\
         \n\
         Return a JSON object with the following fields:\n\
         - \"title\": The subject of the appointment.\n\
         - \"date\": The date in \"YYYY-MM-DD\" format.\n\
         - \"time\": The time in 24-hour \"HH:MM\" format.\n\
         \n\
         If any field cannot be determined, its value should be null.\n\
         For example, 'tomorrow' should be resolved to the correct date. \
         'Evening' can be interpreted as '19:00'.\n",
        today = today.format("%Y-%m-%d"),
        year = today.year(),
        text = text.trim(),
    )
}
