mod console;
mod helpers;
