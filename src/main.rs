fn main() -> anyhow::Result<()> {
    guestbook::cli::run()
}
