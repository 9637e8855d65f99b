mod mutation_scenarios;
mod processor_lifecycle;
mod restore;
mod uploads;
