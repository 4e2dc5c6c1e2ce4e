mod test_agreement;
