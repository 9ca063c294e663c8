use colour::red;

pub fn print_intro() {
    println!(
        r#"
      ____                __
     / __/________ ______/ /_________ __   _____
    / /_/ ___/ __ `/ ___/ __/ ___/ __ `/ | / / _ \
   / __/ /  / /_/ / /__/ /_(__  ) /_/ /| |/ /  __/
  /_/ /_/   \__,_/\___/\__/____/\__,_/ |___/\___/ "#
    );

    if cfg!(debug_assertions) {
        red!("\nWARNING: YOU ARE RUNNING IN DEBUG MODE. Rendering and compression are way slower than they should be.\n\n");
    }
}
